//! Unified error types surfaced by the runtime API.
//!
//! Wraps failures from the broker seam, message construction, and worker
//! coordination so processes can bubble them up with consistent context.
use thiserror::Error;
use tokio::sync::oneshot;

use sim_messages::MessageError;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("bus client is closed")]
    BusClosed,

    #[error("cannot publish to an empty topic")]
    EmptyTopic,

    #[error("invalid topic pattern '{pattern}': {reason}")]
    InvalidTopicPattern { pattern: String, reason: &'static str },

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("epoch {0} window falls outside the supported time range")]
    EpochWindowOutOfRange(u64),

    #[error("failed to build outgoing message")]
    Message(#[from] MessageError),

    #[error("{0} command channel closed")]
    CommandChannelClosed(&'static str),

    #[error("{0} reply channel closed")]
    ReplyChannelClosed(&'static str, #[source] oneshot::error::RecvError),

    #[error("{0} worker join failed")]
    WorkerJoin(&'static str, #[source] tokio::task::JoinError),
}

/// Failures reported by a [`crate::bus::Broker`] implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("connection to {host}:{port} refused")]
    ConnectionRefused { host: String, port: u16 },

    #[error("authentication failed for login '{login}'")]
    Authentication { login: String },

    #[error("exchange '{exchange}' redeclared with different durable/auto-delete flags")]
    ExchangeMismatch { exchange: String },

    #[error("broker connection closed")]
    ConnectionClosed,
}
