//! Per-process epoch lifecycle.

mod config;
mod state;
mod worker;

pub use config::ComponentConfig;
pub use state::ComponentState;
pub use worker::SimulationComponent;

pub(crate) use worker::ComponentCommand;
