use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};
use tracing::warn;

use crate::attributes::{Attributes, names};
use crate::envelope::{Envelope, ResultFields};
use crate::error::{MessageError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum StatusValue {
    Ready,
    Error,
}

/// A component's outcome for one epoch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusMessage {
    envelope: Envelope,
    result: ResultFields,
    value: StatusValue,
    description: Option<String>,
}

impl StatusMessage {
    pub const MESSAGE_TYPE: &'static str = "Status";

    /// An error status without a description is accepted but logged.
    pub fn new(
        envelope: Envelope,
        result: ResultFields,
        value: StatusValue,
        description: Option<String>,
    ) -> Result<Self> {
        if envelope.message_type() != Self::MESSAGE_TYPE {
            return Err(MessageError::MessageType {
                expected: Self::MESSAGE_TYPE.to_owned(),
                found: envelope.message_type().to_owned(),
            });
        }

        let message = Self {
            envelope,
            result,
            value,
            description,
        };
        if message.is_missing_error_description() {
            warn!(
                message_id = message.envelope.message_id(),
                "error status message without a description"
            );
        }
        Ok(message)
    }

    pub fn from_attributes(attrs: &Attributes<'_>) -> Result<Self> {
        let envelope = Envelope::from_attributes(attrs, Self::MESSAGE_TYPE)?;
        let result = ResultFields::from_attributes(attrs)?;
        let raw = attrs.required_str(names::VALUE)?;
        let value = raw.parse().map_err(|_| {
            MessageError::value(names::VALUE, format!("'{raw}' is not a valid status value"))
        })?;
        let description = attrs.optional_str(names::DESCRIPTION)?.map(str::to_owned);
        Self::new(envelope, result, value, description)
    }

    /// Decodes a JSON object, or `None` when it does not fit the schema.
    pub fn from_json(json: &Map<String, Value>) -> Option<Self> {
        Self::from_attributes(&Attributes::new(json)).ok()
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn result(&self) -> &ResultFields {
        &self.result
    }

    pub fn value(&self) -> StatusValue {
        self.value
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_ready(&self) -> bool {
        self.value == StatusValue::Ready
    }

    /// True for an error status that carries no description.
    pub fn is_missing_error_description(&self) -> bool {
        self.value == StatusValue::Error && self.description.is_none()
    }

    pub fn to_json(&self) -> Map<String, Value> {
        let mut json = Map::new();
        self.envelope.write_json(&mut json);
        self.result.write_json(&mut json);
        json.insert(names::VALUE.into(), self.value.as_ref().into());
        if let Some(description) = &self.description {
            json.insert(names::DESCRIPTION.into(), description.clone().into());
        }
        json
    }
}
