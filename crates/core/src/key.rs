//! Hierarchical configuration keys.
//!
//! Keys are `/`-separated paths such as `network/proxy/port`. Leading and
//! trailing separators are ignored; empty segments are rejected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::KEY_SEPARATOR;
use crate::error::ConfigError;

/// A validated, normalized configuration key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConfigKey(String);

impl ConfigKey {
    /// Parses a `/`-separated key; empty segments are rejected.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim().trim_matches(KEY_SEPARATOR);
        if trimmed.is_empty() {
            return Err(invalid(raw, "key is empty"));
        }
        for segment in trimmed.split(KEY_SEPARATOR) {
            if segment.trim().is_empty() {
                return Err(invalid(raw, "key contains an empty segment"));
            }
            if segment.chars().any(char::is_control) {
                return Err(invalid(raw, "key contains control characters"));
            }
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(KEY_SEPARATOR)
    }

    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// The last segment.
    pub fn leaf(&self) -> &str {
        self.0
            .rsplit_once(KEY_SEPARATOR)
            .map_or(self.0.as_str(), |(_, leaf)| leaf)
    }

    /// The key one segment up, `None` for a single-segment key.
    pub fn parent(&self) -> Option<ConfigKey> {
        self.0
            .rsplit_once(KEY_SEPARATOR)
            .map(|(parent, _)| ConfigKey(parent.to_string()))
    }

    pub fn child(&self, segment: &str) -> Result<ConfigKey, ConfigError> {
        ConfigKey::parse(&format!("{}{}{}", self.0, KEY_SEPARATOR, segment))
    }

    /// Joins an optional prefix and a segment.
    pub fn join(prefix: Option<&ConfigKey>, segment: &str) -> Result<ConfigKey, ConfigError> {
        match prefix {
            Some(prefix) => prefix.child(segment),
            None => ConfigKey::parse(segment),
        }
    }

    /// True when `self` lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &ConfigKey) -> bool {
        self.relative_to(ancestor).is_some()
    }

    /// The remainder of this key below `ancestor`, if it is a strict descendant.
    pub fn relative_to(&self, ancestor: &ConfigKey) -> Option<&str> {
        self.0
            .strip_prefix(ancestor.as_str())
            .and_then(|rest| rest.strip_prefix(KEY_SEPARATOR))
            .filter(|rest| !rest.is_empty())
    }

    /// First segment of the remainder below `prefix` (or of the whole key at the root).
    pub fn child_segment_under(&self, prefix: Option<&ConfigKey>) -> Option<&str> {
        let rest = match prefix {
            Some(prefix) => self.relative_to(prefix)?,
            None => self.as_str(),
        };
        rest.split(KEY_SEPARATOR).next()
    }
}

fn invalid(raw: &str, message: &str) -> ConfigError {
    ConfigError::InvalidKey {
        key: raw.to_string(),
        message: message.to_string(),
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::parse(s)
    }
}

impl TryFrom<&str> for ConfigKey {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        ConfigKey::parse(value)
    }
}

impl TryFrom<String> for ConfigKey {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ConfigKey::parse(&value)
    }
}

impl From<ConfigKey> for String {
    fn from(key: ConfigKey) -> Self {
        key.0
    }
}

impl AsRef<str> for ConfigKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
