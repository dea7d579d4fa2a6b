//! JSON scheme definitions.
//!
//! Three document shapes are accepted:
//! - an array of entry definitions (one unnamed scheme),
//! - `{"name": "...", "entries": [...]}` (one named scheme),
//! - an array of named schemes.
//!
//! An entry definition looks like
//! `{"key": "network/port", "type": "number", "default": 8080, "min": 1, "max": 65535}`.
//! `type` is case-insensitive; `flags` may list `MANDATORY` and `SECRET`.

use serde::Deserialize;
use serde_json::Value;

use super::{Scheme, SchemeEntry};
use crate::entry::{EntryType, EntryValue};
use crate::error::ConfigError;
use crate::key::ConfigKey;

/// Named validation patterns with a fixed meaning.
const PORT_PATTERN: &str = "port";

#[derive(Debug, Deserialize)]
struct EntryDefinition {
    key: String,
    #[serde(rename = "type", default)]
    entry_type: Option<String>,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, alias = "validationPattern")]
    pattern: Option<String>,
    #[serde(default)]
    flags: Vec<String>,
    #[serde(default)]
    mandatory: bool,
    #[serde(default)]
    secret: bool,
    #[serde(default, alias = "allowed")]
    values: Vec<String>,
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct NamedScheme {
    name: String,
    entries: Vec<EntryDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SchemeDocument {
    Named(NamedScheme),
    Many(Vec<NamedScheme>),
    Entries(Vec<EntryDefinition>),
}

fn parse_type(raw: Option<&str>) -> Result<EntryType, ConfigError> {
    let Some(raw) = raw else {
        return Ok(EntryType::String);
    };
    let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
    let entry_type = match normalized.as_str() {
        "string" | "text" => EntryType::String,
        "number" | "integer" | "float" => EntryType::Number,
        "boolean" | "bool" => EntryType::Boolean,
        "bytes" => EntryType::Bytes,
        "enum" => EntryType::Enum,
        "enum_set" | "enumset" => EntryType::EnumSet,
        "list" | "multiple_strings" => EntryType::List,
        "object" | "map" => EntryType::Object,
        _ => return Err(ConfigError::InvalidScheme(format!("unknown type '{raw}'"))),
    };
    Ok(entry_type)
}

impl EntryDefinition {
    fn into_entry(self) -> Result<SchemeEntry, ConfigError> {
        let key = ConfigKey::parse(&self.key)
            .map_err(|e| ConfigError::InvalidScheme(e.to_string()))?;
        let mut entry = SchemeEntry::new(key, parse_type(self.entry_type.as_deref())?)
            .with_allowed_values(self.values)
            .with_range(self.min, self.max);

        let has_flag = |wanted: &str| self.flags.iter().any(|flag| flag.eq_ignore_ascii_case(wanted));
        if self.mandatory || has_flag("mandatory") {
            entry = entry.mandatory();
        }
        if self.secret || has_flag("secret") {
            entry = entry.secret();
        }
        if let Some(description) = self.description {
            entry = entry.with_description(description);
        }
        match self.pattern.as_deref() {
            Some(PORT_PATTERN) => {
                entry = entry.with_range(Some(1.0), Some(f64::from(u16::MAX)));
            }
            Some(pattern) => entry = entry.with_pattern(pattern)?,
            None => {}
        }
        if let Some(default) = self.default {
            let value = EntryValue::from_json(&default).ok_or_else(|| {
                ConfigError::InvalidScheme(format!("unsupported default for {}", self.key))
            })?;
            entry = entry.with_default(value);
        }
        Ok(entry)
    }
}

fn build(entries: Vec<EntryDefinition>) -> Result<Scheme, ConfigError> {
    let mut scheme = Scheme::new();
    for definition in entries {
        scheme.insert(definition.into_entry()?)?;
    }
    Ok(scheme)
}

impl Scheme {
    /// Parses a single scheme; a name in the document is ignored.
    pub fn from_json(json: &str) -> Result<Scheme, ConfigError> {
        match parse_document(json)? {
            SchemeDocument::Entries(entries) => build(entries),
            SchemeDocument::Named(named) => build(named.entries),
            SchemeDocument::Many(mut many) if many.len() == 1 => build(many.remove(0).entries),
            SchemeDocument::Many(_) => Err(ConfigError::InvalidScheme(
                "expected a single scheme".to_string(),
            )),
        }
    }

    /// Parses a scheme document into named schemes.
    ///
    /// An unnamed document takes `default_name`; without one it is rejected.
    pub fn parse_document(
        json: &str,
        default_name: Option<&str>,
    ) -> Result<Vec<(String, Scheme)>, ConfigError> {
        match parse_document(json)? {
            SchemeDocument::Entries(entries) => {
                let name = default_name.ok_or_else(|| {
                    ConfigError::InvalidScheme("unnamed scheme needs a configuration name".to_string())
                })?;
                Ok(vec![(name.to_string(), build(entries)?)])
            }
            SchemeDocument::Named(named) => Ok(vec![(named.name, build(named.entries)?)]),
            SchemeDocument::Many(many) => many
                .into_iter()
                .map(|named| Ok((named.name, build(named.entries)?)))
                .collect(),
        }
    }
}

fn parse_document(json: &str) -> Result<SchemeDocument, ConfigError> {
    serde_json::from_str(json).map_err(|e| {
        ConfigError::InvalidScheme(format!(
            "not a scheme document (line {}, column {})",
            e.line(),
            e.column()
        ))
    })
}
