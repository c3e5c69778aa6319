use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};

use crate::attributes::{Attributes, names};
use crate::envelope::Envelope;
use crate::error::{MessageError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum SimulationState {
    Running,
    Stopped,
}

/// Starts or stops a simulation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationStateMessage {
    envelope: Envelope,
    simulation_state: SimulationState,
    name: Option<String>,
    description: Option<String>,
}

impl SimulationStateMessage {
    pub const MESSAGE_TYPE: &'static str = "SimState";

    pub fn new(
        envelope: Envelope,
        simulation_state: SimulationState,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<Self> {
        if envelope.message_type() != Self::MESSAGE_TYPE {
            return Err(MessageError::MessageType {
                expected: Self::MESSAGE_TYPE.to_owned(),
                found: envelope.message_type().to_owned(),
            });
        }
        Ok(Self {
            envelope,
            simulation_state,
            name,
            description,
        })
    }

    pub fn from_attributes(attrs: &Attributes<'_>) -> Result<Self> {
        let envelope = Envelope::from_attributes(attrs, Self::MESSAGE_TYPE)?;
        let raw = attrs.required_str(names::SIMULATION_STATE)?;
        let state = raw.parse().map_err(|_| MessageError::StateValue {
            value: raw.to_owned(),
        })?;
        Self::new(
            envelope,
            state,
            attrs.optional_str(names::NAME)?.map(str::to_owned),
            attrs.optional_str(names::DESCRIPTION)?.map(str::to_owned),
        )
    }

    /// Decodes a JSON object, or `None` when it does not fit the schema.
    pub fn from_json(json: &Map<String, Value>) -> Option<Self> {
        Self::from_attributes(&Attributes::new(json)).ok()
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn simulation_state(&self) -> SimulationState {
        self.simulation_state
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn to_json(&self) -> Map<String, Value> {
        let mut json = Map::new();
        self.envelope.write_json(&mut json);
        json.insert(names::SIMULATION_STATE.into(), self.simulation_state.as_ref().into());
        if let Some(name) = &self.name {
            json.insert(names::NAME.into(), name.clone().into());
        }
        if let Some(description) = &self.description {
            json.insert(names::DESCRIPTION.into(), description.clone().into());
        }
        json
    }
}
