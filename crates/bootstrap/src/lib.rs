//! Shared bootstrap utilities for simulation processes.
//!
//! Provides environment configuration loading and logging setup that every
//! manager or component binary reuses.
pub mod config;
pub mod logging;

pub use config::{
    PlatformConfig, bus_from_env, bus_from_lookup, component_from_env, component_from_lookup,
    manager_from_env, manager_from_lookup,
};
pub use logging::LoggingConfig;
