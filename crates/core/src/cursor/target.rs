//! Mapping cursor children onto caller-defined targets.

use crate::entry::Entry;
use crate::error::ConfigError;

/// Receives entries mapped by `ConfigCursor::copy_map_to_object`.
pub trait ConfigTarget {
    /// True when the target has a field (or setter) with this name.
    fn accepts(&self, field: &str) -> bool;

    /// Stores `entry` into `field`; a conversion failure is reported as an error.
    fn set_field(&mut self, field: &str, entry: &Entry) -> Result<(), ConfigError>;
}

/// How mapping treats entries a target accepts but cannot store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strictness {
    /// Skip the entry and keep mapping.
    #[default]
    Lenient,
    /// Stop at the first failure and return it.
    Strict,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldCase {
    #[default]
    Snake,
    Camel,
    Pascal,
    /// The key segment unchanged.
    AsIs,
}

/// Turns a key segment into a field name: `prefix + cased(segment) + suffix`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetterConvention {
    pub prefix: String,
    pub suffix: String,
    pub case: FieldCase,
}

impl SetterConvention {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>, case: FieldCase) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
            case,
        }
    }

    /// `max-connections` → `max_connections`.
    pub fn snake_case() -> Self {
        Self::default()
    }

    /// `max-connections` → `setMaxConnections`.
    pub fn java_bean() -> Self {
        Self::new("set", "", FieldCase::Pascal)
    }

    pub fn field_name(&self, segment: &str) -> String {
        let words = words(segment);
        let cased = match self.case {
            FieldCase::AsIs => segment.to_string(),
            FieldCase::Snake => words.join("_"),
            FieldCase::Pascal => words.iter().map(|word| capitalize(word)).collect(),
            FieldCase::Camel => words
                .iter()
                .enumerate()
                .map(|(i, word)| if i == 0 { word.clone() } else { capitalize(word) })
                .collect(),
        };
        format!("{}{}{}", self.prefix, cased, self.suffix)
    }
}

/// Lowercase words of a segment, split on separators and lower-to-upper case changes.
fn words(segment: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut previous_lower = false;
    for c in segment.chars() {
        if matches!(c, '-' | '_' | '.' | ' ') {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            previous_lower = false;
            continue;
        }
        if c.is_uppercase() && previous_lower {
            words.push(std::mem::take(&mut current));
        }
        previous_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_per_case() {
        assert_eq!(SetterConvention::snake_case().field_name("max-connections"), "max_connections");
        assert_eq!(SetterConvention::snake_case().field_name("maxConnections"), "max_connections");
        assert_eq!(SetterConvention::java_bean().field_name("max_connections"), "setMaxConnections");
        assert_eq!(
            SetterConvention::new("", "", FieldCase::Camel).field_name("Max-Connections"),
            "maxConnections"
        );
        assert_eq!(
            SetterConvention::new("with_", "", FieldCase::AsIs).field_name("port"),
            "with_port"
        );
    }

    #[test]
    fn test_digits_stay_with_their_word() {
        assert_eq!(SetterConvention::snake_case().field_name("ipv6Enabled"), "ipv6_enabled");
    }
}
