//! Public runtime API surface.
//!
//! This module gathers the types exposed to consumers of the runtime crate so
//! the bus, component and manager modules can stay focused on their workers.

pub mod errors;
pub mod handle;
pub mod processor;

pub use errors::{BrokerError, Result, RuntimeError};
pub use handle::{ComponentHandle, ManagerHandle};
pub use processor::{EpochContext, EpochProcessor};
