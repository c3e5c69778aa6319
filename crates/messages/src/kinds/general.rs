use serde_json::{Map, Value};

use crate::attributes::{Attributes, names};
use crate::envelope::{Envelope, ResultFields};
use crate::error::{MessageError, Result};

/// Message of an application-registered type.
///
/// Carries the envelope, result fields when `EpochNumber` is present, and the
/// remaining attributes as raw JSON. Typed access to the extra attributes,
/// including unit-checked blocks, goes through [`GeneralMessage::attributes`].
#[derive(Clone, Debug, PartialEq)]
pub struct GeneralMessage {
    envelope: Envelope,
    result: Option<ResultFields>,
    extra: Map<String, Value>,
}

impl GeneralMessage {
    pub fn new(
        envelope: Envelope,
        result: Option<ResultFields>,
        extra: Map<String, Value>,
    ) -> Result<Self> {
        if let Some(reserved) = extra.keys().find(|name| {
            Envelope::is_envelope_attribute(name) || ResultFields::is_result_attribute(name)
        }) {
            return Err(MessageError::value(
                names::TYPE,
                format!("'{reserved}' cannot be set as an additional attribute"),
            ));
        }

        let extra = extra.into_iter().filter(|(_, value)| !value.is_null()).collect();
        Ok(Self {
            envelope,
            result,
            extra,
        })
    }

    pub fn from_attributes(message_type: &str, attrs: &Attributes<'_>) -> Result<Self> {
        let envelope = Envelope::from_attributes(attrs, message_type)?;
        let result = if attrs.contains(names::EPOCH_NUMBER) {
            Some(ResultFields::from_attributes(attrs)?)
        } else {
            None
        };
        let extra = attrs
            .raw()
            .iter()
            .filter(|(name, _)| {
                !Envelope::is_envelope_attribute(name) && !ResultFields::is_result_attribute(name)
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Self::new(envelope, result, extra)
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn result(&self) -> Option<&ResultFields> {
        self.result.as_ref()
    }

    pub fn attributes(&self) -> Attributes<'_> {
        Attributes::new(&self.extra)
    }

    pub fn to_json(&self) -> Map<String, Value> {
        let mut json = Map::new();
        self.envelope.write_json(&mut json);
        if let Some(result) = &self.result {
            result.write_json(&mut json);
        }
        json.extend(self.extra.iter().map(|(name, value)| (name.clone(), value.clone())));
        json
    }
}
