//! Error types raised while building and decoding messages.
//!
//! Construction errors always name the wire attribute that failed validation,
//! so a rejected payload can be traced back to the offending field.

use thiserror::Error;

/// Schema validation failure raised at message construction.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("{attribute} attribute is missing from the message")]
    MissingAttribute { attribute: &'static str },

    #[error("{attribute} must be {expected}")]
    WrongType {
        attribute: &'static str,
        expected: &'static str,
    },

    #[error("'{found}' is not an allowed message type (expected '{expected}')")]
    MessageType { expected: String, found: String },

    #[error("'{value}' is an invalid datetime for {attribute}")]
    Date {
        attribute: &'static str,
        value: String,
    },

    #[error("'{value}' is an invalid message id for {attribute}")]
    Id {
        attribute: &'static str,
        value: String,
    },

    #[error("'{value}' is an invalid source process id")]
    Source { value: String },

    #[error("invalid value for {attribute}: {reason}")]
    Value {
        attribute: &'static str,
        reason: String,
    },

    #[error("invalid epoch value for {attribute}: {reason}")]
    EpochValue {
        attribute: &'static str,
        reason: String,
    },

    #[error("'{value}' is not a valid value for simulation state")]
    StateValue { value: String },

    #[error("unit '{found}' is not allowed for {attribute} (expected one of {expected:?})")]
    Unit {
        attribute: &'static str,
        expected: Vec<String>,
        found: String,
    },

    #[error("invalid block for {attribute}: {reason}")]
    Block {
        attribute: &'static str,
        reason: String,
    },
}

impl MessageError {
    /// Wire name of the attribute that failed validation.
    pub fn attribute(&self) -> &'static str {
        use crate::attributes::names;

        match self {
            Self::MissingAttribute { attribute }
            | Self::WrongType { attribute, .. }
            | Self::Date { attribute, .. }
            | Self::Id { attribute, .. }
            | Self::Value { attribute, .. }
            | Self::EpochValue { attribute, .. }
            | Self::Unit { attribute, .. }
            | Self::Block { attribute, .. } => attribute,
            Self::MessageType { .. } => names::TYPE,
            Self::Source { .. } => names::SOURCE_PROCESS_ID,
            Self::StateValue { .. } => names::SIMULATION_STATE,
        }
    }

    pub(crate) fn value(attribute: &'static str, reason: impl Into<String>) -> Self {
        Self::Value {
            attribute,
            reason: reason.into(),
        }
    }

    pub(crate) fn block(attribute: &'static str, reason: impl Into<String>) -> Self {
        Self::Block {
            attribute,
            reason: reason.into(),
        }
    }
}

/// Failure to turn a payload into a typed message through the factory.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FactoryError {
    #[error("no message type found")]
    MissingType,

    #[error("message type '{0}' is not supported by the factory")]
    UnregisteredType(String),

    #[error(transparent)]
    Invalid(#[from] MessageError),
}

pub type Result<T> = std::result::Result<T, MessageError>;
