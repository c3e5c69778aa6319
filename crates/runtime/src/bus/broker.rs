//! Seam between the bus client and a concrete message broker.
//!
//! The client only needs a topic exchange: publish with a routing key, and
//! bind a queue to a set of routing patterns.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::config::BusConfig;
use super::topic::TopicPattern;
use crate::api::BrokerError;

/// A payload as delivered to a bound queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Receiving end of a queue bound to the exchange. Ends when the connection
/// or the broker goes away.
pub type Queue = mpsc::UnboundedReceiver<Delivery>;

#[async_trait]
pub trait Broker: Send + Sync {
    /// Opens a connection and declares the configured exchange.
    async fn connect(&self, config: &BusConfig) -> Result<Arc<dyn Connection>, BrokerError>;
}

#[async_trait]
pub trait Connection: Send + Sync {
    /// Publishes to the connection's exchange.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerError>;

    /// Declares an exclusive queue bound to every pattern.
    async fn bind_queue(&self, patterns: &[TopicPattern]) -> Result<Queue, BrokerError>;

    /// Releases the connection and every queue it declared.
    async fn close(&self);
}
