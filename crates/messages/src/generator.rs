//! Per-process helper stamping outgoing messages.

use serde_json::{Map, Value};

use crate::envelope::{Envelope, ResultFields};
use crate::error::Result;
use crate::kinds::{
    EpochMessage, GeneralMessage, SimulationState, SimulationStateMessage, StatusMessage,
    StatusValue,
};
use crate::timestamp::Timestamp;

/// Creates messages for one process in one simulation.
///
/// Message ids are `"<source_process_id>-<n>"` with `n` counting up from the
/// start id (1 by default). Each message gets a fresh timestamp.
#[derive(Clone, Debug)]
pub struct MessageGenerator {
    simulation_id: String,
    source_process_id: String,
    next_id: u64,
}

impl MessageGenerator {
    pub fn new(simulation_id: impl Into<String>, source_process_id: impl Into<String>) -> Self {
        Self::with_start_id(simulation_id, source_process_id, 1)
    }

    pub fn with_start_id(
        simulation_id: impl Into<String>,
        source_process_id: impl Into<String>,
        start_id: u64,
    ) -> Self {
        Self {
            simulation_id: simulation_id.into(),
            source_process_id: source_process_id.into(),
            next_id: start_id,
        }
    }

    pub fn simulation_id(&self) -> &str {
        &self.simulation_id
    }

    pub fn source_process_id(&self) -> &str {
        &self.source_process_id
    }

    pub fn next_message_id(&mut self) -> String {
        let id = format!("{}-{}", self.source_process_id, self.next_id);
        self.next_id += 1;
        id
    }

    pub fn envelope(&mut self, message_type: &str) -> Result<Envelope> {
        let message_id = self.next_message_id();
        Envelope::new(
            message_type,
            self.simulation_id.as_str(),
            self.source_process_id.as_str(),
            message_id,
            Some(Timestamp::now()),
        )
    }

    pub fn status_ready(
        &mut self,
        epoch_number: u64,
        triggering_message_ids: Vec<String>,
    ) -> Result<StatusMessage> {
        StatusMessage::new(
            self.envelope(StatusMessage::MESSAGE_TYPE)?,
            ResultFields::new(epoch_number, triggering_message_ids)?,
            StatusValue::Ready,
            None,
        )
    }

    pub fn status_error(
        &mut self,
        epoch_number: u64,
        triggering_message_ids: Vec<String>,
        description: impl Into<String>,
    ) -> Result<StatusMessage> {
        StatusMessage::new(
            self.envelope(StatusMessage::MESSAGE_TYPE)?,
            ResultFields::new(epoch_number, triggering_message_ids)?,
            StatusValue::Error,
            Some(description.into()),
        )
    }

    pub fn epoch(
        &mut self,
        epoch_number: u64,
        triggering_message_ids: Vec<String>,
        start_time: Timestamp,
        end_time: Timestamp,
    ) -> Result<EpochMessage> {
        EpochMessage::new(
            self.envelope(EpochMessage::MESSAGE_TYPE)?,
            ResultFields::new(epoch_number, triggering_message_ids)?,
            start_time,
            end_time,
        )
    }

    pub fn simulation_state(
        &mut self,
        state: SimulationState,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<SimulationStateMessage> {
        SimulationStateMessage::new(
            self.envelope(SimulationStateMessage::MESSAGE_TYPE)?,
            state,
            name,
            description,
        )
    }

    pub fn general(
        &mut self,
        message_type: &str,
        result: Option<ResultFields>,
        attributes: Map<String, Value>,
    ) -> Result<GeneralMessage> {
        GeneralMessage::new(self.envelope(message_type)?, result, attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_count_up_per_source() {
        let mut generator = MessageGenerator::new("sim", "grid");
        assert_eq!(generator.next_message_id(), "grid-1");
        let status = generator.status_ready(0, Vec::new()).unwrap();
        assert_eq!(status.envelope().message_id(), "grid-2");
        assert_eq!(status.envelope().source_process_id(), "grid");
    }

    #[test]
    fn custom_start_id() {
        let mut generator = MessageGenerator::with_start_id("sim", "grid", 10);
        assert_eq!(generator.next_message_id(), "grid-10");
    }

    #[test]
    fn failed_construction_still_consumes_an_id() {
        let mut generator = MessageGenerator::new("sim", "grid");
        assert!(generator.status_ready(1, Vec::new()).is_err());
        assert_eq!(generator.next_message_id(), "grid-2");
    }
}
