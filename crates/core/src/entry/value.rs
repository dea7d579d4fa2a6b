//! Plain entry payloads and their coercions.
//!
//! Coercions are lenient where the intent is unambiguous (`"8080"` reads as an
//! integer, `"yes"` as a boolean) and return `None` otherwise; the caller turns
//! `None` into a `ConfigError::Conversion` for the key at hand.

use std::fmt;

use serde::Serialize;

use super::EntryType;

/// A numeric payload; integers and floats are kept apart to avoid precision loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Number::Integer(value) => Some(value),
            Number::Float(value) => {
                let in_range = value >= i64::MIN as f64 && value <= i64::MAX as f64;
                (value.fract() == 0.0 && in_range).then_some(value as i64)
            }
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(value) => value as f64,
            Number::Float(value) => value,
        }
    }

    /// Parses an integer first, then a float.
    pub fn parse(text: &str) -> Option<Number> {
        let text = text.trim();
        if let Ok(value) = text.parse::<i64>() {
            return Some(Number::Integer(value));
        }
        text.parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(Number::Float)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(value) => write!(f, "{value}"),
            Number::Float(value) => write!(f, "{value}"),
        }
    }
}

/// The plain value of an entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntryValue {
    Text(String),
    Number(Number),
    Boolean(bool),
    Bytes(Vec<u8>),
    Enum(String),
    EnumSet(Vec<String>),
    List(Vec<EntryValue>),
    /// Marker for an interior node; objects carry no payload of their own.
    Object,
}

impl EntryValue {
    pub fn entry_type(&self) -> EntryType {
        match self {
            EntryValue::Text(_) => EntryType::String,
            EntryValue::Number(_) => EntryType::Number,
            EntryValue::Boolean(_) => EntryType::Boolean,
            EntryValue::Bytes(_) => EntryType::Bytes,
            EntryValue::Enum(_) => EntryType::Enum,
            EntryValue::EnumSet(_) => EntryType::EnumSet,
            EntryValue::List(_) => EntryType::List,
            EntryValue::Object => EntryType::Object,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            EntryValue::Text(text) | EntryValue::Enum(text) => Some(text.clone()),
            EntryValue::Number(number) => Some(number.to_string()),
            EntryValue::Boolean(flag) => Some(flag.to_string()),
            EntryValue::Bytes(bytes) => String::from_utf8(bytes.clone()).ok(),
            EntryValue::EnumSet(_) | EntryValue::List(_) | EntryValue::Object => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            EntryValue::Number(number) => Some(*number),
            EntryValue::Text(text) | EntryValue::Enum(text) => Number::parse(text),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_number().and_then(Number::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_number().map(Number::as_f64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EntryValue::Boolean(flag) => Some(*flag),
            EntryValue::Text(text) | EntryValue::Enum(text) => parse_bool(text),
            EntryValue::Number(Number::Integer(0)) => Some(false),
            EntryValue::Number(Number::Integer(1)) => Some(true),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<Vec<u8>> {
        match self {
            EntryValue::Bytes(bytes) => Some(bytes.clone()),
            EntryValue::Text(text) | EntryValue::Enum(text) => Some(text.as_bytes().to_vec()),
            _ => None,
        }
    }

    /// Textual list elements; a scalar reads as a single-element list.
    pub fn as_list(&self) -> Option<Vec<String>> {
        match self {
            EntryValue::List(items) => items.iter().map(EntryValue::as_text).collect(),
            EntryValue::EnumSet(names) => Some(names.clone()),
            EntryValue::Object => None,
            scalar => scalar.as_text().map(|text| vec![text]),
        }
    }

    /// Canonical byte form, used when a plain value is sealed as a secret.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            EntryValue::Bytes(bytes) => bytes.clone(),
            EntryValue::List(_) | EntryValue::EnumSet(_) => self
                .as_list()
                .map(|items| items.join("\n").into_bytes())
                .unwrap_or_default(),
            EntryValue::Object => Vec::new(),
            scalar => scalar.as_text().unwrap_or_default().into_bytes(),
        }
    }

    /// Converts to the declared type, or `None` if the value cannot represent it.
    pub fn convert_to(&self, target: EntryType) -> Option<EntryValue> {
        if self.entry_type() == target {
            return Some(self.clone());
        }
        match target {
            EntryType::String => self.as_text().map(EntryValue::Text),
            EntryType::Number => self.as_number().map(EntryValue::Number),
            EntryType::Boolean => self.as_bool().map(EntryValue::Boolean),
            EntryType::Bytes => self.as_bytes().map(EntryValue::Bytes),
            EntryType::Enum => self.as_text().map(EntryValue::Enum),
            EntryType::EnumSet => self.as_list().map(EntryValue::EnumSet),
            EntryType::List => self
                .as_list()
                .map(|items| EntryValue::List(items.into_iter().map(EntryValue::Text).collect())),
            EntryType::Object => None,
        }
    }

    /// Element values and their type, for values that expand inside a cursor.
    pub fn elements(&self) -> Option<(Vec<EntryValue>, Option<EntryType>)> {
        match self {
            EntryValue::List(items) => Some((items.clone(), None)),
            EntryValue::EnumSet(names) => Some((
                names.iter().cloned().map(EntryValue::Enum).collect(),
                Some(EntryType::Enum),
            )),
            _ => None,
        }
    }
}

/// Accepts true/false, yes/no, on/off and 1/0, case-insensitively.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

impl fmt::Display for EntryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryValue::Text(text) | EntryValue::Enum(text) => f.write_str(text),
            EntryValue::Number(number) => write!(f, "{number}"),
            EntryValue::Boolean(flag) => write!(f, "{flag}"),
            EntryValue::Bytes(bytes) => f.write_str(&hex::encode(bytes)),
            EntryValue::EnumSet(names) => write!(f, "[{}]", names.join(", ")),
            EntryValue::List(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            EntryValue::Object => f.write_str("{}"),
        }
    }
}

impl From<&str> for EntryValue {
    fn from(value: &str) -> Self {
        EntryValue::Text(value.to_string())
    }
}

impl From<String> for EntryValue {
    fn from(value: String) -> Self {
        EntryValue::Text(value)
    }
}

impl From<i64> for EntryValue {
    fn from(value: i64) -> Self {
        EntryValue::Number(Number::Integer(value))
    }
}

impl From<i32> for EntryValue {
    fn from(value: i32) -> Self {
        EntryValue::Number(Number::Integer(i64::from(value)))
    }
}

impl From<u16> for EntryValue {
    fn from(value: u16) -> Self {
        EntryValue::Number(Number::Integer(i64::from(value)))
    }
}

impl From<f64> for EntryValue {
    fn from(value: f64) -> Self {
        EntryValue::Number(Number::Float(value))
    }
}

impl From<bool> for EntryValue {
    fn from(value: bool) -> Self {
        EntryValue::Boolean(value)
    }
}

impl From<Vec<u8>> for EntryValue {
    fn from(value: Vec<u8>) -> Self {
        EntryValue::Bytes(value)
    }
}

impl From<Vec<String>> for EntryValue {
    fn from(value: Vec<String>) -> Self {
        EntryValue::List(value.into_iter().map(EntryValue::Text).collect())
    }
}

impl From<Vec<&str>> for EntryValue {
    fn from(value: Vec<&str>) -> Self {
        EntryValue::List(value.into_iter().map(EntryValue::from).collect())
    }
}
