use serde_json::{Map, Value};

/// Wire attribute for a JSON payload without a usable schema.
pub const INVALID_MESSAGE: &str = "invalid_message";
/// Wire attribute for a payload that was not JSON at all.
pub const INVALID_JSON_MESSAGE: &str = "invalid_json_message";

/// A payload that could not be classified as a typed message.
///
/// It has no envelope: no simulation id and no message type.
#[derive(Clone, Debug, PartialEq)]
pub enum InvalidMessage {
    Json(Value),
    Text(String),
}

impl InvalidMessage {
    pub fn to_json(&self) -> Map<String, Value> {
        let mut json = Map::new();
        match self {
            Self::Json(value) => json.insert(INVALID_MESSAGE.into(), value.clone()),
            Self::Text(text) => json.insert(INVALID_JSON_MESSAGE.into(), text.clone().into()),
        };
        json
    }
}
