//! Bookkeeping of which participants have answered which epoch.

use std::collections::BTreeMap;

use sim_messages::StatusMessage;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct ParticipantStatus {
    latest_epoch: Option<u64>,
    status_message_id: Option<String>,
    error: Option<String>,
}

/// Latest ready status of every participant of a simulation.
#[derive(Clone, Debug, Default)]
pub struct ParticipantRegistry {
    participants: BTreeMap<String, ParticipantStatus>,
}

impl ParticipantRegistry {
    pub fn new<I, S>(participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            participants: participants
                .into_iter()
                .map(|id| (id.into(), ParticipantStatus::default()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn contains(&self, participant: &str) -> bool {
        self.participants.contains_key(participant)
    }

    /// Records a status message; returns `false` for unknown senders.
    ///
    /// An error status marks the participant as failed. A ready status moves
    /// its latest epoch forward, never back.
    pub fn register(&mut self, status: &StatusMessage) -> bool {
        let Some(entry) = self
            .participants
            .get_mut(status.envelope().source_process_id())
        else {
            return false;
        };

        let epoch = status.result().epoch_number();
        if !status.is_ready() {
            entry.error = Some(
                status
                    .description()
                    .unwrap_or("no description given")
                    .to_owned(),
            );
            return true;
        }
        if entry.latest_epoch.is_none_or(|latest| epoch >= latest) {
            entry.latest_epoch = Some(epoch);
            entry.status_message_id = Some(status.envelope().message_id().to_owned());
        }
        true
    }

    /// Latest epoch every participant has answered, if any.
    pub fn latest_full_epoch(&self) -> Option<u64> {
        self.participants
            .values()
            .map(|status| status.latest_epoch)
            .min()
            .flatten()
    }

    pub fn is_epoch_complete(&self, epoch: u64) -> bool {
        self.latest_full_epoch().is_some_and(|full| full >= epoch)
    }

    /// Participants that have not answered `epoch` yet.
    pub fn pending(&self, epoch: u64) -> Vec<&str> {
        self.participants
            .iter()
            .filter(|(_, status)| status.latest_epoch.is_none_or(|latest| latest < epoch))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Ids of the latest status of every participant.
    pub fn latest_status_ids(&self) -> Vec<String> {
        self.participants
            .values()
            .filter_map(|status| status.status_message_id.clone())
            .collect()
    }

    /// First participant that reported an error, with the description.
    pub fn first_error(&self) -> Option<(&str, &str)> {
        self.participants
            .iter()
            .find_map(|(id, status)| status.error.as_deref().map(|error| (id.as_str(), error)))
    }
}
