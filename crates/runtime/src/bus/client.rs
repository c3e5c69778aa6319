//! Publish/subscribe client on top of a [`Broker`].
//!
//! Each listener owns a queue and a worker task, so a slow listener never
//! delays delivery to the others, while one listener sees messages in the
//! order they arrived. Publishing is fire-and-forget from the caller's point
//! of view: payloads go through a single ordered publisher task.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use sim_messages::{Message, MessageFactory};

use super::broker::{Broker, Connection, Queue};
use super::config::BusConfig;
use super::topic::TopicPattern;
use crate::api::{Result, RuntimeError};

struct Outgoing {
    topic: String,
    payload: Vec<u8>,
}

#[derive(Default)]
struct ClientState {
    closing: bool,
    topics: BTreeSet<String>,
    listeners: Vec<JoinHandle<()>>,
    publisher: Option<(mpsc::UnboundedSender<Outgoing>, JoinHandle<()>)>,
}

/// Connection to the message bus for one process.
///
/// Listener callbacks run on the listener's worker task. A callback must not
/// call [`BusClient::close`] on its own client, since `close` waits for every
/// listener to finish; forward the message to a channel instead.
pub struct BusClient {
    config: BusConfig,
    factory: Arc<MessageFactory>,
    connection: Arc<dyn Connection>,
    shutdown: CancellationToken,
    state: Mutex<ClientState>,
    closed: AtomicBool,
}

impl BusClient {
    /// Connects to the broker and starts the publisher task.
    pub async fn connect(
        broker: &dyn Broker,
        config: BusConfig,
        factory: Arc<MessageFactory>,
    ) -> Result<Self> {
        let connection = broker.connect(&config).await?;
        info!(
            address = %config.address(),
            exchange = %config.exchange,
            tls = config.tls.enabled,
            "connected to message bus"
        );

        let (publish_tx, publish_rx) = mpsc::unbounded_channel();
        let publisher = tokio::spawn(run_publisher(Arc::clone(&connection), publish_rx));

        Ok(Self {
            config,
            factory,
            connection,
            shutdown: CancellationToken::new(),
            state: Mutex::new(ClientState {
                publisher: Some((publish_tx, publisher)),
                ..ClientState::default()
            }),
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// True once [`BusClient::close`] has completed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// De-duplicated set of every registered pattern.
    pub fn listened_topics(&self) -> Result<BTreeSet<String>> {
        let state = self.lock_state();
        if state.closing {
            return Err(RuntimeError::BusClosed);
        }
        Ok(state.topics.clone())
    }

    /// Registers `callback` for every message whose topic matches one of
    /// `patterns`.
    ///
    /// The payload is decoded through the message factory first; payloads
    /// that are not typed messages arrive as [`Message::Invalid`].
    pub async fn add_listener<I, S, F, Fut>(&self, patterns: I, callback: F) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(Message, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let closing = self.lock_state().closing;
        if closing {
            return Err(RuntimeError::BusClosed);
        }

        let patterns = patterns
            .into_iter()
            .map(|pattern| TopicPattern::parse(pattern.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let queue = self.connection.bind_queue(&patterns).await?;

        let labels: Vec<String> = patterns.iter().map(|p| p.as_str().to_owned()).collect();
        debug!(patterns = ?labels, "listener registered");

        let token = self.shutdown.child_token();
        let factory = Arc::clone(&self.factory);
        let worker = tokio::spawn(run_listener(queue, factory, token, labels.clone(), callback));

        let mut state = self.lock_state();
        if state.closing {
            // close() started while the queue was being bound.
            worker.abort();
            return Err(RuntimeError::BusClosed);
        }
        state.topics.extend(labels);
        state.listeners.push(worker);
        Ok(())
    }

    /// Queues `payload` for publishing to `topic` and returns immediately.
    ///
    /// Payloads from one client reach the broker in the order they were
    /// queued.
    pub fn send_message(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        if topic.is_empty() {
            return Err(RuntimeError::EmptyTopic);
        }

        let state = self.lock_state();
        let sender = match &state.publisher {
            Some((sender, _)) if !state.closing => sender,
            _ => return Err(RuntimeError::BusClosed),
        };
        sender
            .send(Outgoing {
                topic: topic.to_owned(),
                payload,
            })
            .map_err(|_| RuntimeError::BusClosed)
    }

    /// Serializes `message` and queues it for `topic`.
    pub fn publish(&self, topic: &str, message: &Message) -> Result<()> {
        self.send_message(topic, message.serialize())
    }

    /// Stops every listener, flushes queued publishes and releases the
    /// connection.
    ///
    /// Dispatches already in progress finish first; no callback runs after
    /// this returns. Calling it again is a no-op.
    pub async fn close(&self) {
        let (listeners, publisher) = {
            let mut state = self.lock_state();
            if state.closing {
                return;
            }
            state.closing = true;
            state.topics.clear();
            (std::mem::take(&mut state.listeners), state.publisher.take())
        };

        self.shutdown.cancel();
        for listener in listeners {
            if let Err(join_error) = listener.await
                && !join_error.is_cancelled()
            {
                error!(error = %join_error, "listener worker failed");
            }
        }

        if let Some((sender, task)) = publisher {
            drop(sender);
            if let Err(join_error) = task.await {
                error!(error = %join_error, "publisher task failed");
            }
        }

        self.connection.close().await;
        self.closed.store(true, Ordering::Release);
        info!("message bus connection closed");
    }

    fn lock_state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for BusClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_publisher(
    connection: Arc<dyn Connection>,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
) {
    while let Some(Outgoing { topic, payload }) = outgoing.recv().await {
        trace!(%topic, bytes = payload.len(), "publishing");
        if let Err(error) = connection.publish(&topic, payload).await {
            error!(%topic, %error, "failed to publish message");
        }
    }
}

async fn run_listener<F, Fut>(
    mut queue: Queue,
    factory: Arc<MessageFactory>,
    shutdown: CancellationToken,
    patterns: Vec<String>,
    callback: F,
) where
    F: Fn(Message, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            delivery = queue.recv() => {
                let Some(delivery) = delivery else {
                    warn!(?patterns, "listener queue closed by the broker");
                    break;
                };
                let message = factory.decode_payload(&delivery.payload);
                if message.is_invalid() {
                    debug!(
                        topic = %delivery.topic,
                        "received a payload that is not a valid message"
                    );
                }
                callback(message, delivery.topic).await;
            }
        }
    }
    trace!(?patterns, "listener stopped");
}
