//! Runtime for epoch-driven co-simulations over a topic message bus.
//!
//! A [`SimulationManager`] publishes epochs and waits until every participant
//! answers each one; a [`SimulationComponent`] wraps a user
//! [`EpochProcessor`] and reports ready or error for every epoch it handles.
//! Both talk through a [`BusClient`] connected to a [`Broker`].
//!
//! Modules are organized by responsibility:
//! - [`api`] exposes the types downstream clients interact with
//! - [`bus`] provides topic-based publish/subscribe
//! - [`component`] and [`manager`] host the two worker roles
//! - [`timer`] schedules delayed callbacks
pub mod api;
pub mod bus;
pub mod component;
pub mod manager;
pub mod timer;

pub use api::{
    BrokerError, ComponentHandle, EpochContext, EpochProcessor, ManagerHandle, Result,
    RuntimeError,
};
pub use bus::{Broker, BusClient, BusConfig, Connection, MemoryBroker, TlsConfig, TopicPattern};
pub use component::{ComponentConfig, ComponentState, SimulationComponent};
pub use manager::{
    ManagerConfig, ManagerState, ParticipantRegistry, SimulationManager, SimulationOutcome,
};
pub use timer::Timer;
