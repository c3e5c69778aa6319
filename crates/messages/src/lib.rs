//! Message schema for the simulation platform.
//!
//! Every message shares an [`Envelope`] (type, simulation, sender, id and
//! timestamp). Result messages add [`ResultFields`] with epoch bookkeeping.
//! Construction validates every attribute and fails with a [`MessageError`]
//! naming the offending wire attribute.
//!
//! Modules are organized by responsibility:
//! - [`kinds`] defines the concrete message variants
//! - [`block`] holds the measurement blocks embedded in result messages
//! - [`factory`] turns payloads into typed [`Message`] values
//! - [`generator`] stamps outgoing messages for one process
pub mod attributes;
pub mod block;
pub mod envelope;
pub mod error;
pub mod factory;
pub mod generator;
pub mod kinds;
pub mod message;
pub mod timestamp;

pub use attributes::{Attributes, names};
pub use block::{ArrayValues, QuantityArrayBlock, QuantityBlock, TimeSeriesBlock, ValueArrayBlock};
pub use envelope::{Envelope, IterationStatus, ResultFields, WARNING_PREFIXES};
pub use error::{FactoryError, MessageError, Result};
pub use factory::{Constructor, MessageFactory};
pub use generator::MessageGenerator;
pub use kinds::{
    EpochMessage, GeneralMessage, InvalidMessage, SimulationState, SimulationStateMessage,
    StatusMessage, StatusValue,
};
pub use message::Message;
pub use timestamp::{Timestamp, TimestampParseError};
