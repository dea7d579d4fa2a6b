//! Configuration entries.
//!
//! Responsibilities:
//! - Define `EntryType`, the type tag carried by every entry.
//! - Define `Entry`, the immutable value node returned by lookups.
//! - Provide typed accessors that coerce the payload or fail with `ConfigError::Conversion`.
//!
//! Does NOT handle:
//! - Scheme validation or defaults (see `scheme`).
//! - Where entries are stored (see `layer`).
//!
//! Invariants:
//! - Entries are immutable; writes create new entries.
//! - A secret entry renders as `[REDACTED]` through `Display`, `Debug` and `Serialize`.
//!   Its bytes are only reachable through `Entry::secret()`.

mod json;
mod value;

use std::fmt;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretBox};
use serde::{Serialize, Serializer};

pub use json::{BYTES_TAG, is_bytes_marker};
pub use value::{EntryValue, Number, parse_bool};

use crate::constants::REDACTED_MARKER;
use crate::error::ConfigError;
use crate::key::ConfigKey;
use crate::location::Location;
use crate::scope::Scope;
use crate::secrets::SecretValue;

/// Type tag of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    #[default]
    String,
    Number,
    Boolean,
    Bytes,
    Enum,
    EnumSet,
    List,
    Object,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryType::String => "string",
            EntryType::Number => "number",
            EntryType::Boolean => "boolean",
            EntryType::Bytes => "bytes",
            EntryType::Enum => "enum",
            EntryType::EnumSet => "enum_set",
            EntryType::List => "list",
            EntryType::Object => "object",
        }
    }

    /// Types whose values expand into indexed children inside a cursor.
    pub fn is_sequence(self) -> bool {
        matches!(self, EntryType::List | EntryType::EnumSet)
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
enum Payload {
    Plain(EntryValue),
    Sealed(Arc<SecretBox<[u8]>>),
}

/// A resolved configuration value with its provenance.
#[derive(Clone)]
pub struct Entry {
    key: ConfigKey,
    entry_type: EntryType,
    payload: Payload,
    comment: Option<String>,
    location: Option<Location>,
    is_default: bool,
}

impl Entry {
    pub fn new(key: ConfigKey, value: impl Into<EntryValue>) -> Self {
        let value = value.into();
        Self {
            key,
            entry_type: value.entry_type(),
            payload: Payload::Plain(value),
            comment: None,
            location: None,
            is_default: false,
        }
    }

    /// A secret entry holding the bytes of `secret`.
    pub fn from_secret(key: ConfigKey, secret: &SecretValue) -> Self {
        let bytes = secret.expose().map(<[u8]>::to_vec).unwrap_or_default();
        Self {
            key,
            entry_type: secret.entry_type(),
            payload: Payload::Sealed(Arc::new(SecretBox::new(bytes.into_boxed_slice()))),
            comment: None,
            location: None,
            is_default: false,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub(crate) fn with_key(mut self, key: ConfigKey) -> Self {
        self.key = key;
        self
    }

    pub(crate) fn with_value(mut self, value: EntryValue) -> Self {
        self.entry_type = value.entry_type();
        self.payload = Payload::Plain(value);
        self
    }

    pub(crate) fn into_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Seals a plain entry; secret entries are returned unchanged.
    pub fn into_secret(self) -> Self {
        match self.payload {
            Payload::Sealed(_) => self,
            Payload::Plain(ref value) => {
                let bytes = value.to_bytes();
                Self {
                    payload: Payload::Sealed(Arc::new(SecretBox::new(bytes.into_boxed_slice()))),
                    ..self
                }
            }
        }
    }

    /// Re-types a plain entry to the declared type.
    pub fn retyped(self, target: EntryType) -> Result<Self, ConfigError> {
        match &self.payload {
            Payload::Sealed(_) => Ok(Self {
                entry_type: target,
                ..self
            }),
            Payload::Plain(value) => {
                let converted =
                    value
                        .convert_to(target)
                        .ok_or_else(|| ConfigError::Conversion {
                            key: self.key.to_string(),
                            expected: target.as_str(),
                            found: self.entry_type,
                        })?;
                Ok(Self {
                    entry_type: target,
                    payload: Payload::Plain(converted),
                    ..self
                })
            }
        }
    }

    pub fn key(&self) -> &ConfigKey {
        &self.key
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// Scope of the layer the entry was read from.
    pub fn scope(&self) -> Option<Scope> {
        self.location.as_ref().map(Location::scope)
    }

    pub fn is_secret(&self) -> bool {
        matches!(self.payload, Payload::Sealed(_))
    }

    /// True for values synthesized from a scheme default.
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// The plain value; secret entries return `ConfigError::SecretRedacted`.
    pub fn value(&self) -> Result<&EntryValue, ConfigError> {
        match &self.payload {
            Payload::Plain(value) => Ok(value),
            Payload::Sealed(_) => Err(ConfigError::SecretRedacted {
                key: self.key.to_string(),
            }),
        }
    }

    /// A copy of the raw bytes as an erasable secret. Works for plain entries too.
    pub fn secret(&self) -> SecretValue {
        let bytes = match &self.payload {
            Payload::Plain(value) => value.to_bytes(),
            Payload::Sealed(sealed) => sealed.expose_secret().to_vec(),
        };
        SecretValue::new(bytes, self.entry_type)
    }

    /// True when both entries carry the same type and payload.
    pub fn same_value(&self, other: &Entry) -> bool {
        if self.entry_type != other.entry_type {
            return false;
        }
        match (&self.payload, &other.payload) {
            (Payload::Plain(a), Payload::Plain(b)) => a == b,
            (Payload::Sealed(a), Payload::Sealed(b)) => a.expose_secret() == b.expose_secret(),
            _ => false,
        }
    }

    pub fn as_string(&self) -> Result<String, ConfigError> {
        self.coerce("string", EntryValue::as_text)
    }

    pub fn as_i64(&self) -> Result<i64, ConfigError> {
        self.coerce("integer", EntryValue::as_i64)
    }

    pub fn as_i32(&self) -> Result<i32, ConfigError> {
        self.coerce("32-bit integer", |value| {
            value.as_i64().and_then(|wide| i32::try_from(wide).ok())
        })
    }

    pub fn as_f64(&self) -> Result<f64, ConfigError> {
        self.coerce("float", EntryValue::as_f64)
    }

    pub fn as_bool(&self) -> Result<bool, ConfigError> {
        self.coerce("boolean", EntryValue::as_bool)
    }

    pub fn as_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        self.coerce("bytes", EntryValue::as_bytes)
    }

    pub fn as_list(&self) -> Result<Vec<String>, ConfigError> {
        self.coerce("list", EntryValue::as_list)
    }

    fn coerce<T>(
        &self,
        expected: &'static str,
        convert: impl FnOnce(&EntryValue) -> Option<T>,
    ) -> Result<T, ConfigError> {
        convert(self.value()?).ok_or_else(|| ConfigError::Conversion {
            key: self.key.to_string(),
            expected,
            found: self.entry_type,
        })
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Payload::Plain(value) => write!(f, "{value}"),
            Payload::Sealed(_) => f.write_str(REDACTED_MARKER),
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Entry");
        debug
            .field("key", &self.key.as_str())
            .field("type", &self.entry_type);
        match &self.payload {
            Payload::Plain(value) => debug.field("value", value),
            Payload::Sealed(_) => debug.field("value", &REDACTED_MARKER),
        };
        debug
            .field("scope", &self.scope())
            .field("is_default", &self.is_default)
            .finish()
    }
}

impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(untagged)]
        enum ValueView<'a> {
            Plain(&'a EntryValue),
            Redacted(&'static str),
        }

        #[derive(Serialize)]
        struct EntryView<'a> {
            key: &'a str,
            #[serde(rename = "type")]
            entry_type: EntryType,
            value: ValueView<'a>,
            #[serde(skip_serializing_if = "Option::is_none")]
            comment: Option<&'a str>,
        }

        let value = match &self.payload {
            Payload::Plain(value) => ValueView::Plain(value),
            Payload::Sealed(_) => ValueView::Redacted(REDACTED_MARKER),
        };
        EntryView {
            key: self.key.as_str(),
            entry_type: self.entry_type,
            value,
            comment: self.comment.as_deref(),
        }
        .serialize(serializer)
    }
}
