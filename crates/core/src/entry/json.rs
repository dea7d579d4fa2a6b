//! Conversion between entry values and `serde_json::Value`.
//!
//! Byte payloads travel as `{"$bytes": "<hex>"}` so they survive text formats.

use serde_json::{Map, Value};

use super::{EntryValue, Number};

/// Object key marking a hex-encoded byte payload.
pub const BYTES_TAG: &str = "$bytes";

impl EntryValue {
    /// Converts a JSON scalar or array; objects other than a bytes marker yield `None`.
    pub fn from_json(value: &Value) -> Option<EntryValue> {
        match value {
            Value::String(text) => Some(EntryValue::Text(text.clone())),
            Value::Bool(flag) => Some(EntryValue::Boolean(*flag)),
            Value::Number(number) => number
                .as_i64()
                .map(Number::Integer)
                .or_else(|| number.as_f64().map(Number::Float))
                .map(EntryValue::Number),
            Value::Array(items) => items
                .iter()
                .map(EntryValue::from_json)
                .collect::<Option<Vec<_>>>()
                .map(EntryValue::List),
            Value::Object(map) => decode_bytes(map).map(EntryValue::Bytes),
            Value::Null => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            EntryValue::Text(text) | EntryValue::Enum(text) => Value::String(text.clone()),
            EntryValue::Number(Number::Integer(value)) => Value::from(*value),
            EntryValue::Number(Number::Float(value)) => Value::from(*value),
            EntryValue::Boolean(flag) => Value::Bool(*flag),
            EntryValue::Bytes(bytes) => {
                let mut map = Map::new();
                map.insert(BYTES_TAG.to_string(), Value::String(hex::encode(bytes)));
                Value::Object(map)
            }
            EntryValue::EnumSet(names) => {
                Value::Array(names.iter().cloned().map(Value::String).collect())
            }
            EntryValue::List(items) => Value::Array(items.iter().map(EntryValue::to_json).collect()),
            EntryValue::Object => Value::Object(Map::new()),
        }
    }
}

/// True for an object that encodes a byte payload rather than a nested table.
pub fn is_bytes_marker(map: &Map<String, Value>) -> bool {
    decode_bytes(map).is_some()
}

fn decode_bytes(map: &Map<String, Value>) -> Option<Vec<u8>> {
    if map.len() != 1 {
        return None;
    }
    map.get(BYTES_TAG)
        .and_then(Value::as_str)
        .and_then(|encoded| hex::decode(encoded).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars_and_lists() {
        assert_eq!(
            EntryValue::from_json(&json!(8080)),
            Some(EntryValue::Number(Number::Integer(8080)))
        );
        assert_eq!(
            EntryValue::from_json(&json!(0.5)),
            Some(EntryValue::Number(Number::Float(0.5)))
        );
        assert_eq!(
            EntryValue::from_json(&json!(["a", 1])),
            Some(EntryValue::List(vec![
                EntryValue::from("a"),
                EntryValue::from(1_i64)
            ]))
        );
        assert_eq!(EntryValue::from_json(&Value::Null), None);
    }

    #[test]
    fn test_bytes_marker() {
        let value = EntryValue::Bytes(vec![0xca, 0xfe]);
        let json = value.to_json();
        assert_eq!(json, json!({"$bytes": "cafe"}));
        assert_eq!(EntryValue::from_json(&json), Some(value));
        assert!(EntryValue::from_json(&json!({"$bytes": "zz"})).is_none());
        assert!(EntryValue::from_json(&json!({"nested": 1})).is_none());
    }

    #[test]
    fn test_enum_set_renders_as_string_array() {
        let set = EntryValue::EnumSet(vec!["A".to_string(), "B".to_string()]);
        assert_eq!(set.to_json(), json!(["A", "B"]));
    }
}
