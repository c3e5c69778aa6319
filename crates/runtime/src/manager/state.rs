use strum::Display;

/// Lifecycle of the simulation manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ManagerState {
    Idle,
    /// Waiting for every participant to answer `epoch` (0 is the start handshake).
    Running { epoch: u64 },
    Stopping,
    Stopped,
}

/// How a simulation run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimulationOutcome {
    Completed { epochs: u64 },
    Failed { reason: String },
}

impl SimulationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
