//! The message sum type and its canonical wire encoding.

use serde_json::{Map, Value};

use crate::envelope::{Envelope, ResultFields};
use crate::kinds::{
    EpochMessage, GeneralMessage, InvalidMessage, SimulationStateMessage, StatusMessage,
};

/// Any message that can travel over the bus.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Status(StatusMessage),
    Epoch(EpochMessage),
    SimulationState(SimulationStateMessage),
    General(GeneralMessage),
    Invalid(InvalidMessage),
}

impl Message {
    /// Envelope of a typed message; `None` for invalid payloads.
    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            Self::Status(message) => Some(message.envelope()),
            Self::Epoch(message) => Some(message.envelope()),
            Self::SimulationState(message) => Some(message.envelope()),
            Self::General(message) => Some(message.envelope()),
            Self::Invalid(_) => None,
        }
    }

    pub fn result(&self) -> Option<&ResultFields> {
        match self {
            Self::Status(message) => Some(message.result()),
            Self::Epoch(message) => Some(message.result()),
            Self::General(message) => message.result(),
            Self::SimulationState(_) | Self::Invalid(_) => None,
        }
    }

    pub fn message_type(&self) -> Option<&str> {
        self.envelope().map(Envelope::message_type)
    }

    pub fn simulation_id(&self) -> Option<&str> {
        self.envelope().map(Envelope::simulation_id)
    }

    pub fn message_id(&self) -> Option<&str> {
        self.envelope().map(Envelope::message_id)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }

    pub fn to_json(&self) -> Map<String, Value> {
        match self {
            Self::Status(message) => message.to_json(),
            Self::Epoch(message) => message.to_json(),
            Self::SimulationState(message) => message.to_json(),
            Self::General(message) => message.to_json(),
            Self::Invalid(message) => message.to_json(),
        }
    }

    /// Canonical JSON bytes.
    pub fn serialize(&self) -> Vec<u8> {
        Value::Object(self.to_json()).to_string().into_bytes()
    }
}

impl From<StatusMessage> for Message {
    fn from(message: StatusMessage) -> Self {
        Self::Status(message)
    }
}

impl From<EpochMessage> for Message {
    fn from(message: EpochMessage) -> Self {
        Self::Epoch(message)
    }
}

impl From<SimulationStateMessage> for Message {
    fn from(message: SimulationStateMessage) -> Self {
        Self::SimulationState(message)
    }
}

impl From<GeneralMessage> for Message {
    fn from(message: GeneralMessage) -> Self {
        Self::General(message)
    }
}

impl From<InvalidMessage> for Message {
    fn from(message: InvalidMessage) -> Self {
        Self::Invalid(message)
    }
}
