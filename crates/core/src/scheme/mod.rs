//! Configuration schemes.
//!
//! Responsibilities:
//! - Describe the expected entries of a configuration: type, default, secret and
//!   mandatory flags, description, and validators (pattern, allowed values, range).
//! - Validate values before they are written and entries as they are resolved.
//! - Synthesize defaults for keys no layer provides.
//!
//! Does NOT handle:
//! - Storing entries; a scheme is consulted on resolution and on `put`, never persisted.
//! - Loading schemes from disk (see the sources crate's `JsonSchemeProvider`).
//!
//! Invariants:
//! - Patterns match the whole textual value.
//! - A default that fails its own validators is rejected when the scheme is built.

mod definition;
mod registry;

pub use registry::{SchemeProvider, SchemeRegistry};

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;

use crate::entry::{Entry, EntryType, EntryValue};
use crate::error::ConfigError;
use crate::key::ConfigKey;

/// Expectations for one key.
#[derive(Clone)]
pub struct SchemeEntry {
    key: ConfigKey,
    entry_type: EntryType,
    default: Option<EntryValue>,
    mandatory: bool,
    secret: bool,
    description: Option<String>,
    pattern: Option<Regex>,
    allowed: Vec<String>,
    min: Option<f64>,
    max: Option<f64>,
}

impl SchemeEntry {
    pub fn new(key: ConfigKey, entry_type: EntryType) -> Self {
        Self {
            key,
            entry_type,
            default: None,
            mandatory: false,
            secret: false,
            description: None,
            pattern: None,
            allowed: Vec::new(),
            min: None,
            max: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<EntryValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Restricts textual values to those fully matching `pattern`.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, ConfigError> {
        let anchored = format!("^(?:{pattern})$");
        let regex = Regex::new(&anchored).map_err(|e| {
            ConfigError::InvalidScheme(format!("pattern for {}: {e}", self.key))
        })?;
        self.pattern = Some(regex);
        Ok(self)
    }

    pub fn with_allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn key(&self) -> &ConfigKey {
        &self.key
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn default_value(&self) -> Option<&EntryValue> {
        self.default.as_ref()
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn is_secret(&self) -> bool {
        self.secret
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn allowed_values(&self) -> &[String] {
        &self.allowed
    }

    /// Converts `value` to the declared type and runs every validator.
    pub fn validate(&self, value: &EntryValue) -> Result<EntryValue, String> {
        let converted = value
            .convert_to(self.entry_type)
            .ok_or_else(|| format!("expected {}, found {}", self.entry_type, value.entry_type()))?;

        if let Some(pattern) = &self.pattern {
            for text in texts_of(&converted) {
                if !pattern.is_match(&text) {
                    return Err(format!("'{text}' does not match pattern {}", pattern.as_str()));
                }
            }
        }

        if !self.allowed.is_empty()
            && matches!(self.entry_type, EntryType::Enum | EntryType::EnumSet)
        {
            for text in texts_of(&converted) {
                if !self.allowed.iter().any(|allowed| *allowed == text) {
                    return Err(format!(
                        "'{text}' is not one of [{}]",
                        self.allowed.join(", ")
                    ));
                }
            }
        }

        if let Some(number) = converted.as_f64().filter(|_| self.entry_type == EntryType::Number) {
            if self.min.is_some_and(|min| number < min) || self.max.is_some_and(|max| number > max)
            {
                return Err(format!(
                    "{number} is outside [{}, {}]",
                    bound(self.min),
                    bound(self.max)
                ));
            }
        }

        Ok(converted)
    }

    fn default_entry(&self) -> Option<Entry> {
        let value = self.default.clone()?;
        let entry = Entry::new(self.key.clone(), value).into_default();
        let entry = match &self.description {
            Some(description) => entry.with_comment(description.clone()),
            None => entry,
        };
        Some(if self.secret { entry.into_secret() } else { entry })
    }
}

fn texts_of(value: &EntryValue) -> Vec<String> {
    match value {
        EntryValue::List(_) | EntryValue::EnumSet(_) => value.as_list().unwrap_or_default(),
        scalar => scalar.as_text().into_iter().collect(),
    }
}

fn bound(limit: Option<f64>) -> String {
    limit.map_or_else(|| "..".to_string(), |value| value.to_string())
}

impl fmt::Debug for SchemeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeEntry")
            .field("key", &self.key.as_str())
            .field("type", &self.entry_type)
            .field("mandatory", &self.mandatory)
            .field("secret", &self.secret)
            .field("pattern", &self.pattern.as_ref().map(Regex::as_str))
            .finish_non_exhaustive()
    }
}

/// The expected entries of one configuration.
#[derive(Debug, Clone, Default)]
pub struct Scheme {
    entries: BTreeMap<ConfigKey, SchemeEntry>,
}

impl Scheme {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry; a default must satisfy the entry's own validators.
    pub fn with_entry(mut self, entry: SchemeEntry) -> Result<Self, ConfigError> {
        self.insert(entry)?;
        Ok(self)
    }

    pub fn insert(&mut self, mut entry: SchemeEntry) -> Result<(), ConfigError> {
        if let Some(default) = &entry.default {
            let checked = entry.validate(default).map_err(|message| {
                ConfigError::InvalidScheme(format!("default for {}: {message}", entry.key))
            })?;
            entry.default = Some(checked);
        }
        self.entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    pub fn get(&self, key: &ConfigKey) -> Option<&SchemeEntry> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = &SchemeEntry> {
        self.entries.values()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks a value about to be written.
    pub fn check_input(&self, key: &ConfigKey, value: &EntryValue) -> Result<EntryValue, ConfigError> {
        match self.entries.get(key) {
            Some(declared) => declared.validate(value).map_err(|message| ConfigError::InputInvalid {
                key: key.to_string(),
                message,
            }),
            None => Ok(value.clone()),
        }
    }

    /// Applies type, validators and secret flag to a resolved entry.
    ///
    /// Returns the reason when the entry is invalid and must be skipped.
    pub fn apply(&self, entry: Entry) -> Result<Entry, String> {
        let Some(declared) = self.entries.get(entry.key()) else {
            return Ok(entry);
        };
        let entry = if entry.is_secret() {
            entry
        } else {
            let checked = declared.validate(entry.value().map_err(|e| e.to_string())?)?;
            entry.with_value(checked)
        };
        Ok(if declared.secret { entry.into_secret() } else { entry })
    }

    /// The default for `key`, marked as such and never persisted.
    pub fn default_entry(&self, key: &ConfigKey) -> Option<Entry> {
        self.entries.get(key).and_then(SchemeEntry::default_entry)
    }

    /// Description for `key`, used as the comment of newly created entries.
    pub fn description(&self, key: &ConfigKey) -> Option<&str> {
        self.entries.get(key).and_then(SchemeEntry::description)
    }

    pub fn is_mandatory(&self, key: &ConfigKey) -> bool {
        self.entries.get(key).is_some_and(SchemeEntry::is_mandatory)
    }
}
