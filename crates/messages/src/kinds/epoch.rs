use serde_json::{Map, Value};

use crate::attributes::{Attributes, names};
use crate::envelope::{Envelope, ResultFields};
use crate::error::{MessageError, Result};
use crate::timestamp::Timestamp;

/// Announces the time window of one epoch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EpochMessage {
    envelope: Envelope,
    result: ResultFields,
    start_time: Timestamp,
    end_time: Timestamp,
}

impl EpochMessage {
    pub const MESSAGE_TYPE: &'static str = "Epoch";

    pub fn new(
        envelope: Envelope,
        result: ResultFields,
        start_time: Timestamp,
        end_time: Timestamp,
    ) -> Result<Self> {
        if envelope.message_type() != Self::MESSAGE_TYPE {
            return Err(MessageError::MessageType {
                expected: Self::MESSAGE_TYPE.to_owned(),
                found: envelope.message_type().to_owned(),
            });
        }
        if start_time >= end_time {
            return Err(MessageError::value(
                names::END_TIME,
                format!("epoch end {end_time} is not after start {start_time}"),
            ));
        }
        Ok(Self {
            envelope,
            result,
            start_time,
            end_time,
        })
    }

    pub fn from_attributes(attrs: &Attributes<'_>) -> Result<Self> {
        Self::new(
            Envelope::from_attributes(attrs, Self::MESSAGE_TYPE)?,
            ResultFields::from_attributes(attrs)?,
            attrs.required_timestamp(names::START_TIME)?,
            attrs.required_timestamp(names::END_TIME)?,
        )
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

    pub fn epoch_number(&self) -> u64 {
        self.result.epoch_number()
    }

    pub fn start_time(&self) -> Timestamp {
        self.start_time
    }

    pub fn end_time(&self) -> Timestamp {
        self.end_time
    }

    pub fn to_json(&self) -> Map<String, Value> {
        let mut json = Map::new();
        self.envelope.write_json(&mut json);
        self.result.write_json(&mut json);
        json.insert(names::START_TIME.into(), self.start_time.to_string().into());
        json.insert(names::END_TIME.into(), self.end_time.to_string().into());
        json
    }
}
