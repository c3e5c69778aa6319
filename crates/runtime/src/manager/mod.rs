//! Simulation manager: start handshake, epoch progression and stop.

mod config;
mod registry;
mod state;
mod worker;

pub use config::ManagerConfig;
pub use registry::ParticipantRegistry;
pub use state::{ManagerState, SimulationOutcome};
pub use worker::SimulationManager;

pub(crate) use worker::ManagerCommand;
