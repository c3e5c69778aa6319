//! Topic-based message bus.
//!
//! [`BusClient`] is what processes use; [`Broker`] and [`Connection`] are the
//! seam to the broker behind it. [`MemoryBroker`] implements that seam inside
//! the process.

mod broker;
mod client;
mod config;
mod memory;
mod topic;

pub use broker::{Broker, Connection, Delivery, Queue};
pub use client::BusClient;
pub use config::{BusConfig, TlsConfig};
pub use memory::MemoryBroker;
pub use topic::TopicPattern;
