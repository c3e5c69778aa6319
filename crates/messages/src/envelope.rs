//! Fields shared by every message and by every result message.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};

use crate::attributes::{Attributes, names};
use crate::error::{MessageError, Result};
use crate::timestamp::Timestamp;

/// Prefixes a warning code must start with.
pub const WARNING_PREFIXES: [&str; 6] = [
    "warning.convergence",
    "warning.input",
    "warning.input-range",
    "warning.input-unreliable",
    "warning.internal",
    "warning.other",
];

/// Identity of a message: who sent it, in which simulation, and when.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    message_type: String,
    simulation_id: String,
    source_process_id: String,
    message_id: String,
    timestamp: Timestamp,
}

impl Envelope {
    /// Builds an envelope; a missing timestamp is stamped with the current time.
    pub fn new(
        message_type: impl Into<String>,
        simulation_id: impl Into<String>,
        source_process_id: impl Into<String>,
        message_id: impl Into<String>,
        timestamp: Option<Timestamp>,
    ) -> Result<Self> {
        let envelope = Self {
            message_type: message_type.into(),
            simulation_id: simulation_id.into(),
            source_process_id: source_process_id.into(),
            message_id: message_id.into(),
            timestamp: timestamp.unwrap_or_else(Timestamp::now),
        };
        envelope.validate()?;
        Ok(envelope)
    }

    /// Reads the envelope attributes. `Type` defaults to `message_type` when
    /// absent and must equal it otherwise.
    pub fn from_attributes(attrs: &Attributes<'_>, message_type: &str) -> Result<Self> {
        if let Some(found) = attrs.optional_str(names::TYPE)?
            && found != message_type
        {
            return Err(MessageError::MessageType {
                expected: message_type.to_owned(),
                found: found.to_owned(),
            });
        }

        Self::new(
            message_type,
            attrs.required_str(names::SIMULATION_ID)?,
            attrs.required_str(names::SOURCE_PROCESS_ID)?,
            attrs.required_str(names::MESSAGE_ID)?,
            attrs.optional_timestamp(names::TIMESTAMP)?,
        )
    }

    fn validate(&self) -> Result<()> {
        if self.message_type.is_empty() {
            return Err(MessageError::MessageType {
                expected: "a non-empty type".to_owned(),
                found: String::new(),
            });
        }
        if self.simulation_id.is_empty() {
            return Err(MessageError::Id {
                attribute: names::SIMULATION_ID,
                value: String::new(),
            });
        }
        if self.source_process_id.is_empty() {
            return Err(MessageError::Source {
                value: String::new(),
            });
        }
        if self.message_id.is_empty() {
            return Err(MessageError::Id {
                attribute: names::MESSAGE_ID,
                value: String::new(),
            });
        }
        Ok(())
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn simulation_id(&self) -> &str {
        &self.simulation_id
    }

    pub fn source_process_id(&self) -> &str {
        &self.source_process_id
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub(crate) fn write_json(&self, json: &mut Map<String, Value>) {
        json.insert(names::TYPE.into(), self.message_type.clone().into());
        json.insert(names::SIMULATION_ID.into(), self.simulation_id.clone().into());
        json.insert(names::SOURCE_PROCESS_ID.into(), self.source_process_id.clone().into());
        json.insert(names::MESSAGE_ID.into(), self.message_id.clone().into());
        json.insert(names::TIMESTAMP.into(), self.timestamp.to_string().into());
    }

    pub(crate) fn is_envelope_attribute(name: &str) -> bool {
        matches!(
            name,
            names::TYPE
                | names::SIMULATION_ID
                | names::SOURCE_PROCESS_ID
                | names::MESSAGE_ID
                | names::TIMESTAMP
        )
    }
}

/// Whether a result is a converged value or an intermediate iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum IterationStatus {
    Intermediate,
    Final,
}

/// Epoch bookkeeping carried by result messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultFields {
    epoch_number: u64,
    last_updated_in_epoch: u64,
    triggering_message_ids: Vec<String>,
    warnings: BTreeSet<String>,
    iteration_status: Option<IterationStatus>,
}

impl ResultFields {
    pub fn new(epoch_number: u64, triggering_message_ids: Vec<String>) -> Result<Self> {
        let fields = Self {
            epoch_number,
            last_updated_in_epoch: epoch_number,
            triggering_message_ids,
            warnings: BTreeSet::new(),
            iteration_status: None,
        };
        fields.validate()?;
        Ok(fields)
    }

    pub fn with_last_updated_in_epoch(mut self, epoch: u64) -> Result<Self> {
        self.last_updated_in_epoch = epoch;
        self.validate()?;
        Ok(self)
    }

    pub fn with_warnings<I, S>(mut self, warnings: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.warnings = warnings.into_iter().map(Into::into).collect();
        self.validate()?;
        Ok(self)
    }

    pub fn with_iteration_status(mut self, status: IterationStatus) -> Self {
        self.iteration_status = Some(status);
        self
    }

    pub fn from_attributes(attrs: &Attributes<'_>) -> Result<Self> {
        let epoch_number = attrs.required_epoch(names::EPOCH_NUMBER)?;
        let triggering = attrs
            .optional_string_list(names::TRIGGERING_MESSAGE_IDS)?
            .ok_or(MessageError::MissingAttribute {
                attribute: names::TRIGGERING_MESSAGE_IDS,
            })?;

        let mut fields = Self::new(epoch_number, triggering)?;
        if let Some(last_updated) = attrs.optional_epoch(names::LAST_UPDATED_IN_EPOCH)? {
            fields = fields.with_last_updated_in_epoch(last_updated)?;
        }
        if let Some(warnings) = attrs.optional_string_list(names::WARNINGS)? {
            fields = fields.with_warnings(warnings)?;
        }
        if let Some(raw) = attrs.optional_str(names::ITERATION_STATUS)? {
            let status = raw.parse().map_err(|_| {
                MessageError::value(
                    names::ITERATION_STATUS,
                    format!("'{raw}' is not an iteration status"),
                )
            })?;
            fields = fields.with_iteration_status(status);
        }
        Ok(fields)
    }

    fn validate(&self) -> Result<()> {
        if self.last_updated_in_epoch > self.epoch_number {
            return Err(MessageError::EpochValue {
                attribute: names::LAST_UPDATED_IN_EPOCH,
                reason: format!(
                    "{} is later than epoch {}",
                    self.last_updated_in_epoch, self.epoch_number
                ),
            });
        }
        if self.triggering_message_ids.is_empty() && self.epoch_number > 0 {
            return Err(MessageError::value(
                names::TRIGGERING_MESSAGE_IDS,
                "triggering message ids may be empty only for epoch 0",
            ));
        }
        if let Some(id) = self.triggering_message_ids.iter().find(|id| id.is_empty()) {
            return Err(MessageError::Id {
                attribute: names::TRIGGERING_MESSAGE_IDS,
                value: id.clone(),
            });
        }
        if let Some(warning) = self
            .warnings
            .iter()
            .find(|warning| !WARNING_PREFIXES.iter().any(|prefix| warning.starts_with(prefix)))
        {
            return Err(MessageError::value(
                names::WARNINGS,
                format!("'{warning}' is not an allowed warning"),
            ));
        }
        Ok(())
    }

    pub fn epoch_number(&self) -> u64 {
        self.epoch_number
    }

    pub fn last_updated_in_epoch(&self) -> u64 {
        self.last_updated_in_epoch
    }

    pub fn triggering_message_ids(&self) -> &[String] {
        &self.triggering_message_ids
    }

    pub fn warnings(&self) -> &BTreeSet<String> {
        &self.warnings
    }

    pub fn iteration_status(&self) -> Option<IterationStatus> {
        self.iteration_status
    }

    pub(crate) fn write_json(&self, json: &mut Map<String, Value>) {
        json.insert(names::EPOCH_NUMBER.into(), self.epoch_number.into());
        json.insert(names::LAST_UPDATED_IN_EPOCH.into(), self.last_updated_in_epoch.into());
        json.insert(
            names::TRIGGERING_MESSAGE_IDS.into(),
            self.triggering_message_ids.clone().into(),
        );
        if !self.warnings.is_empty() {
            let warnings: Vec<Value> = self.warnings.iter().cloned().map(Value::from).collect();
            json.insert(names::WARNINGS.into(), Value::Array(warnings));
        }
        if let Some(status) = self.iteration_status {
            json.insert(names::ITERATION_STATUS.into(), status.as_ref().into());
        }
    }

    pub(crate) fn is_result_attribute(name: &str) -> bool {
        matches!(
            name,
            names::EPOCH_NUMBER
                | names::LAST_UPDATED_IN_EPOCH
                | names::TRIGGERING_MESSAGE_IDS
                | names::WARNINGS
                | names::ITERATION_STATUS
        )
    }
}
