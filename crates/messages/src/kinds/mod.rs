//! Concrete message variants.

mod epoch;
mod general;
mod invalid;
mod simulation_state;
mod status;

pub use epoch::EpochMessage;
pub use general::GeneralMessage;
pub use invalid::{INVALID_JSON_MESSAGE, INVALID_MESSAGE, InvalidMessage};
pub use simulation_state::{SimulationState, SimulationStateMessage};
pub use status::{StatusMessage, StatusValue};
