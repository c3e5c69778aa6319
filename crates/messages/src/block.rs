//! Measurement blocks embedded inside result messages.
//!
//! Blocks are plain values: they validate their own shape, and the attribute
//! reader in [`crate::attributes`] checks units against what a given
//! attribute expects.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::attributes::names;
use crate::error::{MessageError, Result};
use crate::timestamp::Timestamp;

/// A scalar with a unit, e.g. `{"Value": 1.5, "UnitOfMeasure": "kW"}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuantityBlock {
    #[serde(rename = "Value")]
    pub value: f64,
    #[serde(rename = "UnitOfMeasure")]
    pub unit_of_measure: String,
}

impl QuantityBlock {
    pub fn new(value: f64, unit_of_measure: impl Into<String>) -> Self {
        Self {
            value,
            unit_of_measure: unit_of_measure.into(),
        }
    }

    pub fn from_json(attribute: &'static str, json: &Value) -> Result<Self> {
        let object = json
            .as_object()
            .ok_or_else(|| MessageError::block(attribute, "quantity block must be an object"))?;
        let value = object
            .get(names::BLOCK_VALUE)
            .and_then(Value::as_f64)
            .ok_or_else(|| {
                MessageError::block(attribute, "quantity block value must be a number")
            })?;
        let unit = unit_of_measure(attribute, object.get(names::UNIT_OF_MEASURE))?;
        Ok(Self::new(value, unit))
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Homogeneous contents of a [`ValueArrayBlock`].
///
/// An empty array decodes as `Float`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArrayValues {
    Integer(Vec<i64>),
    Float(Vec<f64>),
    Text(Vec<String>),
    Bool(Vec<bool>),
}

impl ArrayValues {
    pub fn len(&self) -> usize {
        match self {
            Self::Integer(values) => values.len(),
            Self::Float(values) => values.len(),
            Self::Text(values) => values.len(),
            Self::Bool(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn from_json(attribute: &'static str, values: &[Value]) -> Result<Self> {
        let mixed = || MessageError::block(attribute, "array values must share one type");
        let Some(first) = values.first() else {
            return Ok(Self::Float(Vec::new()));
        };

        match first {
            Value::Number(number) if number.is_i64() => values
                .iter()
                .map(Value::as_i64)
                .collect::<Option<Vec<_>>>()
                .map(Self::Integer)
                .ok_or_else(mixed),
            Value::Number(_) => values
                .iter()
                .map(Value::as_f64)
                .collect::<Option<Vec<_>>>()
                .map(Self::Float)
                .ok_or_else(mixed),
            Value::String(_) => values
                .iter()
                .map(|value| value.as_str().map(str::to_owned))
                .collect::<Option<Vec<_>>>()
                .map(Self::Text)
                .ok_or_else(mixed),
            Value::Bool(_) => values
                .iter()
                .map(Value::as_bool)
                .collect::<Option<Vec<_>>>()
                .map(Self::Bool)
                .ok_or_else(mixed),
            other => Err(MessageError::block(
                attribute,
                format!("{other} is not an allowed array value"),
            )),
        }
    }
}

/// Ordered values sharing a unit: `{"Values": [...], "UnitOfMeasure": "kW"}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValueArrayBlock {
    #[serde(rename = "Values")]
    pub values: ArrayValues,
    #[serde(rename = "UnitOfMeasure")]
    pub unit_of_measure: String,
}

impl ValueArrayBlock {
    pub fn new(values: ArrayValues, unit_of_measure: impl Into<String>) -> Self {
        Self {
            values,
            unit_of_measure: unit_of_measure.into(),
        }
    }

    pub fn from_json(attribute: &'static str, json: &Value) -> Result<Self> {
        let (values, unit) = array_parts(attribute, json)?;
        Ok(Self::new(ArrayValues::from_json(attribute, values)?, unit))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Array form of [`QuantityBlock`]; numeric values only.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuantityArrayBlock {
    #[serde(rename = "Values")]
    pub values: Vec<f64>,
    #[serde(rename = "UnitOfMeasure")]
    pub unit_of_measure: String,
}

impl QuantityArrayBlock {
    pub fn new(values: Vec<f64>, unit_of_measure: impl Into<String>) -> Self {
        Self {
            values,
            unit_of_measure: unit_of_measure.into(),
        }
    }

    pub fn from_json(attribute: &'static str, json: &Value) -> Result<Self> {
        let (values, unit) = array_parts(attribute, json)?;
        let values = values
            .iter()
            .map(Value::as_f64)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                MessageError::block(attribute, "quantity array values must be numbers")
            })?;
        Ok(Self::new(values, unit))
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Named value series over a shared time index.
///
/// Every series holds exactly one value per time index entry, and at least
/// one series is present.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimeSeriesBlock {
    #[serde(rename = "TimeIndex")]
    time_index: Vec<Timestamp>,
    #[serde(rename = "Series")]
    series: BTreeMap<String, ValueArrayBlock>,
}

impl TimeSeriesBlock {
    pub fn new(
        attribute: &'static str,
        time_index: Vec<Timestamp>,
        series: BTreeMap<String, ValueArrayBlock>,
    ) -> Result<Self> {
        if series.is_empty() {
            return Err(MessageError::block(attribute, "at least one series is required"));
        }
        for (name, values) in &series {
            if name.is_empty() {
                return Err(MessageError::block(attribute, "series names must not be empty"));
            }
            if values.len() != time_index.len() {
                return Err(MessageError::block(
                    attribute,
                    format!(
                        "series '{name}' has {} values for {} time index entries",
                        values.len(),
                        time_index.len()
                    ),
                ));
            }
        }
        Ok(Self { time_index, series })
    }

    pub fn from_json(attribute: &'static str, json: &Value) -> Result<Self> {
        let object = json
            .as_object()
            .ok_or_else(|| MessageError::block(attribute, "time series block must be an object"))?;

        let time_index = object
            .get(names::TIME_INDEX)
            .and_then(Value::as_array)
            .ok_or_else(|| MessageError::block(attribute, "time index must be an array"))?
            .iter()
            .map(|entry| {
                entry
                    .as_str()
                    .and_then(|raw| Timestamp::parse(raw).ok())
                    .ok_or_else(|| MessageError::Date {
                        attribute,
                        value: entry.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let series = object
            .get(names::SERIES)
            .and_then(Value::as_object)
            .ok_or_else(|| MessageError::block(attribute, "series must be an object"))?
            .iter()
            .map(|(name, values)| {
                Ok((name.clone(), ValueArrayBlock::from_json(attribute, values)?))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        Self::new(attribute, time_index, series)
    }

    pub fn time_index(&self) -> &[Timestamp] {
        &self.time_index
    }

    pub fn series(&self) -> &BTreeMap<String, ValueArrayBlock> {
        &self.series
    }

    pub fn get_series(&self, name: &str) -> Option<&ValueArrayBlock> {
        self.series.get(name)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn unit_of_measure(attribute: &'static str, value: Option<&Value>) -> Result<String> {
    value
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| MessageError::block(attribute, "unit of measure must be a string"))
}

fn array_parts<'a>(attribute: &'static str, json: &'a Value) -> Result<(&'a [Value], String)> {
    let object = json
        .as_object()
        .ok_or_else(|| MessageError::block(attribute, "array block must be an object"))?;
    let values = object
        .get(names::BLOCK_VALUES)
        .and_then(Value::as_array)
        .ok_or_else(|| MessageError::block(attribute, "values must be an array"))?;
    let unit = unit_of_measure(attribute, object.get(names::UNIT_OF_MEASURE))?;
    Ok((values, unit))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ts(raw: &str) -> Timestamp {
        Timestamp::parse(raw).unwrap()
    }

    #[test]
    fn quantity_block_accepts_integer_values() {
        let raw = json!({"Value": 3, "UnitOfMeasure": "kW"});
        let block = QuantityBlock::from_json("Power", &raw).unwrap();
        assert_eq!(block, QuantityBlock::new(3.0, "kW"));
        assert_eq!(block.to_json(), json!({"Value": 3.0, "UnitOfMeasure": "kW"}));
    }

    #[test]
    fn quantity_block_requires_unit() {
        let err = QuantityBlock::from_json("Power", &json!({"Value": 3.0})).unwrap_err();
        assert_eq!(err.attribute(), "Power");
    }

    #[test]
    fn value_array_must_be_homogeneous() {
        let ok = ValueArrayBlock::from_json(
            "Flags",
            &json!({"Values": [true, false], "UnitOfMeasure": ""}),
        );
        assert_eq!(ok.unwrap().values, ArrayValues::Bool(vec![true, false]));

        let mixed = ValueArrayBlock::from_json(
            "Flags",
            &json!({"Values": [true, "no"], "UnitOfMeasure": ""}),
        );
        assert!(matches!(mixed, Err(MessageError::Block { attribute: "Flags", .. })));
    }

    #[test]
    fn empty_value_array_is_allowed() {
        let block =
            ValueArrayBlock::from_json("Load", &json!({"Values": [], "UnitOfMeasure": "kW"}))
                .unwrap();
        assert!(block.is_empty());
    }

    #[test]
    fn quantity_array_rejects_text() {
        let err =
            QuantityArrayBlock::from_json("Load", &json!({"Values": ["a"], "UnitOfMeasure": "kW"}));
        assert!(err.is_err());
    }

    #[test]
    fn time_series_lengths_must_match_index() {
        let index = vec![ts("2020-01-01T00:00:00Z"), ts("2020-01-01T01:00:00Z")];
        let mut series = BTreeMap::new();
        series.insert(
            "Price".to_owned(),
            ValueArrayBlock::new(ArrayValues::Float(vec![1.0]), "EUR"),
        );
        assert!(TimeSeriesBlock::new("Forecast", index.clone(), series.clone()).is_err());

        series.insert(
            "Price".to_owned(),
            ValueArrayBlock::new(ArrayValues::Float(vec![1.0, 2.0]), "EUR"),
        );
        let block = TimeSeriesBlock::new("Forecast", index, series).unwrap();
        assert_eq!(block.get_series("Price").map(ValueArrayBlock::len), Some(2));
    }

    #[test]
    fn time_series_needs_a_named_series() {
        let index = vec![ts("2020-01-01T00:00:00Z")];
        assert!(TimeSeriesBlock::new("Forecast", index.clone(), BTreeMap::new()).is_err());

        let mut series = BTreeMap::new();
        series.insert(String::new(), ValueArrayBlock::new(ArrayValues::Integer(vec![1]), "kW"));
        assert!(TimeSeriesBlock::new("Forecast", index, series).is_err());
    }

    #[test]
    fn time_series_from_wire_form() {
        let json = json!({
            "TimeIndex": ["2020-01-01T00:00:00Z", "2020-01-01T01:00:00.000Z"],
            "Series": {"Load": {"Values": [1.5, 2.5], "UnitOfMeasure": "kW"}}
        });
        let block = TimeSeriesBlock::from_json("Forecast", &json).unwrap();
        assert_eq!(block.time_index().len(), 2);
        assert_eq!(
            block.to_json()["TimeIndex"],
            json!(["2020-01-01T00:00:00.000Z", "2020-01-01T01:00:00.000Z"])
        );
    }
}
