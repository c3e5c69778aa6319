//! In-process topic exchange implementing [`Broker`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, trace};

use super::broker::{Broker, Connection, Delivery, Queue};
use super::config::BusConfig;
use super::topic::TopicPattern;
use crate::api::BrokerError;

struct Binding {
    queue_id: u64,
    patterns: Vec<TopicPattern>,
    sender: mpsc::UnboundedSender<Delivery>,
}

struct Exchange {
    durable: bool,
    auto_delete: bool,
    bindings: Vec<Binding>,
}

#[derive(Default)]
struct BrokerState {
    exchanges: HashMap<String, Exchange>,
    next_queue_id: u64,
}

/// Broker living inside the process, shared by cloning.
///
/// Exchanges are declared on connect; redeclaring one with different
/// durability or auto-delete settings fails like it would on a real broker.
/// An auto-delete exchange disappears when its last queue is released.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    credentials: Option<(String, String)>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only connections presenting this login and password are accepted.
    pub fn with_credentials(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            state: Arc::default(),
            credentials: Some((login.into(), password.into())),
        }
    }

    /// Number of queues currently bound to `exchange`.
    pub async fn queue_count(&self, exchange: &str) -> usize {
        self.state
            .lock()
            .await
            .exchanges
            .get(exchange)
            .map_or(0, |exchange| exchange.bindings.len())
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn connect(&self, config: &BusConfig) -> Result<Arc<dyn Connection>, BrokerError> {
        if let Some((login, password)) = &self.credentials
            && (login != &config.login || password != &config.password)
        {
            return Err(BrokerError::Authentication {
                login: config.login.clone(),
            });
        }

        let mut state = self.state.lock().await;
        let exchange = state
            .exchanges
            .entry(config.exchange.clone())
            .or_insert_with(|| Exchange {
                durable: config.exchange_durable,
                auto_delete: config.exchange_auto_delete,
                bindings: Vec::new(),
            });
        if exchange.durable != config.exchange_durable
            || exchange.auto_delete != config.exchange_auto_delete
        {
            return Err(BrokerError::ExchangeMismatch {
                exchange: config.exchange.clone(),
            });
        }

        debug!(
            address = %config.address(),
            exchange = %config.exchange,
            "memory broker connection opened"
        );
        Ok(Arc::new(MemoryConnection {
            state: Arc::clone(&self.state),
            exchange: config.exchange.clone(),
            queues: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MemoryConnection {
    state: Arc<Mutex<BrokerState>>,
    exchange: String,
    queues: Mutex<Vec<u64>>,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BrokerError::ConnectionClosed);
        }

        let mut state = self.state.lock().await;
        let Some(exchange) = state.exchanges.get_mut(&self.exchange) else {
            trace!(topic, "exchange has no queues, message dropped");
            return Ok(());
        };

        // Queues whose receiver is gone are unbound on the way.
        exchange.bindings.retain(|binding| {
            if !binding.patterns.iter().any(|pattern| pattern.matches(topic)) {
                return !binding.sender.is_closed();
            }
            binding
                .sender
                .send(Delivery {
                    topic: topic.to_owned(),
                    payload: payload.clone(),
                })
                .is_ok()
        });
        Ok(())
    }

    async fn bind_queue(&self, patterns: &[TopicPattern]) -> Result<Queue, BrokerError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BrokerError::ConnectionClosed);
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.state.lock().await;
        let queue_id = state.next_queue_id;
        state.next_queue_id += 1;

        let exchange = state
            .exchanges
            .get_mut(&self.exchange)
            .ok_or(BrokerError::ConnectionClosed)?;
        exchange.bindings.push(Binding {
            queue_id,
            patterns: patterns.to_vec(),
            sender,
        });
        self.queues.lock().await.push(queue_id);
        Ok(receiver)
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let owned = std::mem::take(&mut *self.queues.lock().await);
        let mut state = self.state.lock().await;
        let remove = match state.exchanges.get_mut(&self.exchange) {
            Some(exchange) => {
                exchange
                    .bindings
                    .retain(|binding| !owned.contains(&binding.queue_id));
                exchange.auto_delete && exchange.bindings.is_empty()
            }
            None => false,
        };
        if remove {
            state.exchanges.remove(&self.exchange);
            debug!(exchange = %self.exchange, "auto-delete exchange removed");
        }
    }
}
