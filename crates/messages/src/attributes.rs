//! Typed access to the attributes of a decoded JSON message.

use serde_json::{Map, Value};

use crate::block::{QuantityArrayBlock, QuantityBlock, TimeSeriesBlock, ValueArrayBlock};
use crate::error::{MessageError, Result};
use crate::timestamp::Timestamp;

/// Wire names of the message attributes.
pub mod names {
    pub const TYPE: &str = "Type";
    pub const SIMULATION_ID: &str = "SimulationId";
    pub const SOURCE_PROCESS_ID: &str = "SourceProcessId";
    pub const MESSAGE_ID: &str = "MessageId";
    pub const TIMESTAMP: &str = "Timestamp";

    pub const EPOCH_NUMBER: &str = "EpochNumber";
    pub const LAST_UPDATED_IN_EPOCH: &str = "LastUpdatedInEpoch";
    pub const TRIGGERING_MESSAGE_IDS: &str = "TriggeringMessageIds";
    pub const WARNINGS: &str = "Warnings";
    pub const ITERATION_STATUS: &str = "IterationStatus";

    pub const VALUE: &str = "Value";
    pub const DESCRIPTION: &str = "Description";
    pub const START_TIME: &str = "StartTime";
    pub const END_TIME: &str = "EndTime";
    pub const SIMULATION_STATE: &str = "SimulationState";
    pub const NAME: &str = "Name";

    pub const BLOCK_VALUE: &str = "Value";
    pub const BLOCK_VALUES: &str = "Values";
    pub const UNIT_OF_MEASURE: &str = "UnitOfMeasure";
    pub const TIME_INDEX: &str = "TimeIndex";
    pub const SERIES: &str = "Series";
}

/// Read-only view over a JSON object that validates attributes on access.
///
/// `null` is treated the same as an absent attribute.
#[derive(Clone, Copy, Debug)]
pub struct Attributes<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Attributes<'a> {
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    pub fn raw(&self) -> &'a Map<String, Value> {
        self.map
    }

    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.map.get(name).filter(|value| !value.is_null())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn optional_str(&self, name: &'static str) -> Result<Option<&'a str>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(value)) => Ok(Some(value)),
            Some(_) => Err(MessageError::WrongType {
                attribute: name,
                expected: "a string",
            }),
        }
    }

    pub fn required_str(&self, name: &'static str) -> Result<&'a str> {
        self.optional_str(name)?.ok_or(MessageError::MissingAttribute { attribute: name })
    }

    /// Epoch counters: non-negative integers.
    pub fn optional_epoch(&self, name: &'static str) -> Result<Option<u64>> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        match value.as_u64() {
            Some(epoch) => Ok(Some(epoch)),
            None => Err(MessageError::EpochValue {
                attribute: name,
                reason: format!("{value} is not a non-negative integer"),
            }),
        }
    }

    pub fn required_epoch(&self, name: &'static str) -> Result<u64> {
        self.optional_epoch(name)?.ok_or(MessageError::MissingAttribute { attribute: name })
    }

    pub fn optional_timestamp(&self, name: &'static str) -> Result<Option<Timestamp>> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        value
            .as_str()
            .and_then(|raw| Timestamp::parse(raw).ok())
            .map(Some)
            .ok_or_else(|| MessageError::Date {
                attribute: name,
                value: value.as_str().map_or_else(|| value.to_string(), str::to_owned),
            })
    }

    pub fn required_timestamp(&self, name: &'static str) -> Result<Timestamp> {
        self.optional_timestamp(name)?.ok_or(MessageError::MissingAttribute { attribute: name })
    }

    pub fn optional_string_list(&self, name: &'static str) -> Result<Option<Vec<String>>> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        value
            .as_array()
            .and_then(|items| {
                items
                    .iter()
                    .map(|item| item.as_str().map(str::to_owned))
                    .collect::<Option<Vec<_>>>()
            })
            .map(Some)
            .ok_or(MessageError::WrongType {
                attribute: name,
                expected: "a list of strings",
            })
    }

    /// Reads a quantity block whose unit must be one of `units`; an empty
    /// slice accepts any unit.
    pub fn quantity_block(
        &self,
        name: &'static str,
        units: &[&str],
    ) -> Result<Option<QuantityBlock>> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        let block = QuantityBlock::from_json(name, value)?;
        check_unit(name, units, &block.unit_of_measure)?;
        Ok(Some(block))
    }

    pub fn quantity_array_block(
        &self,
        name: &'static str,
        units: &[&str],
    ) -> Result<Option<QuantityArrayBlock>> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        let block = QuantityArrayBlock::from_json(name, value)?;
        check_unit(name, units, &block.unit_of_measure)?;
        Ok(Some(block))
    }

    pub fn value_array_block(&self, name: &'static str) -> Result<Option<ValueArrayBlock>> {
        self.get(name)
            .map(|value| ValueArrayBlock::from_json(name, value))
            .transpose()
    }

    pub fn time_series_block(&self, name: &'static str) -> Result<Option<TimeSeriesBlock>> {
        self.get(name)
            .map(|value| TimeSeriesBlock::from_json(name, value))
            .transpose()
    }
}

fn check_unit(attribute: &'static str, units: &[&str], found: &str) -> Result<()> {
    if units.is_empty() || units.contains(&found) {
        return Ok(());
    }
    Err(MessageError::Unit {
        attribute,
        expected: units.iter().map(|unit| (*unit).to_owned()).collect(),
        found: found.to_owned(),
    })
}
