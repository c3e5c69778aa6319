use strum::Display;

/// Lifecycle of a simulation component.
///
/// `Error` is entered when an epoch fails and is left only through an
/// explicit restart. `Stopped` is final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentState {
    Created,
    AwaitingStart,
    Ready { epoch: u64 },
    Processing { epoch: u64 },
    Error { epoch: u64 },
    Stopped,
}

impl ComponentState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Whether epoch messages are acted upon in this state.
    pub fn accepts_epochs(&self) -> bool {
        matches!(
            self,
            Self::AwaitingStart | Self::Ready { .. } | Self::Processing { .. }
        )
    }
}
