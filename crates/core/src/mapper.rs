//! Deserializing a subtree of the merged view with serde.
//!
//! The subtree is first assembled as a `serde_json::Value`: objects for key
//! prefixes, scalars and arrays for entries. Secret entries are left out and
//! byte payloads become arrays of numbers so they deserialize into `Vec<u8>`.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::entry::{Entry, EntryValue};
use crate::error::ConfigError;
use crate::key::ConfigKey;
use crate::layered::LayeredConfiguration;
use crate::scope::ScopeSet;

impl LayeredConfiguration {
    /// Deserializes the subtree below `prefix` (everything when empty) into `T`.
    ///
    /// A key holding an entry hides any deeper keys below it.
    pub fn deserialize_at<T: DeserializeOwned>(&self, prefix: &str) -> Result<T, ConfigError> {
        let tree = self.tree_at(prefix)?;
        Ok(serde_json::from_value(tree)?)
    }

    /// The subtree below `prefix` as JSON.
    pub fn tree_at(&self, prefix: &str) -> Result<Value, ConfigError> {
        let prefix = prefix.trim().trim_matches('/');
        let prefix = if prefix.is_empty() {
            None
        } else {
            Some(ConfigKey::parse(prefix)?)
        };
        // `keys` checks the closed state and polls for changes.
        let mut keys = self.keys(ScopeSet::all())?;
        if let Some(prefix) = &prefix {
            if let Some(entry) = self.resolve_node(prefix, ScopeSet::all()) {
                return Ok(leaf_value(&entry).unwrap_or(Value::Null));
            }
        }
        keys.extend(
            self.scheme()
                .entries()
                .filter(|spec| spec.default_value().is_some())
                .map(|spec| spec.key().clone()),
        );

        let mut root = Map::new();
        for key in keys {
            let relative = match &prefix {
                Some(prefix) => match key.relative_to(prefix) {
                    Some(relative) => relative.to_string(),
                    None => continue,
                },
                None => key.as_str().to_string(),
            };
            let Some(entry) = self.resolve_node(&key, ScopeSet::all()) else {
                continue;
            };
            let Some(value) = leaf_value(&entry) else {
                continue;
            };
            insert(&mut root, &relative, value);
        }
        Ok(Value::Object(root))
    }
}

fn leaf_value(entry: &Entry) -> Option<Value> {
    if entry.is_secret() {
        return None;
    }
    entry.value().ok().map(json_for_serde)
}

fn json_for_serde(value: &EntryValue) -> Value {
    match value {
        EntryValue::Bytes(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
        EntryValue::List(items) => Value::Array(items.iter().map(json_for_serde).collect()),
        other => other.to_json(),
    }
}

/// Inserts `value` at the `/`-separated `path`; existing leaves are never replaced.
fn insert(root: &mut Map<String, Value>, path: &str, value: Value) {
    let mut node = root;
    let mut segments = path.split('/').peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            node.entry(segment.to_string()).or_insert(value);
            return;
        }
        let child = node
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match child {
            Value::Object(map) => node = map,
            _ => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::entry::EntryType;
    use crate::layer::{LayerContents, MemoryLayer};
    use crate::location::Location;
    use crate::scheme::{Scheme, SchemeEntry};
    use crate::scope::Scope;
    use crate::settings::Settings;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Server {
        host: String,
        port: u16,
        #[serde(default)]
        tags: Vec<String>,
        #[serde(default)]
        password: Option<String>,
    }

    fn key(raw: &str) -> ConfigKey {
        ConfigKey::parse(raw).unwrap()
    }

    fn config(entries: Vec<Entry>) -> std::sync::Arc<LayeredConfiguration> {
        let config = LayeredConfiguration::standalone("app", Settings::new("acme", "demo")).unwrap();
        let contents: LayerContents = entries.into_iter().collect();
        let location = Location::new(
            Scope::User,
            "manual",
            Location::opaque_uri("manual", &["user"]).unwrap(),
        );
        config
            .add_layer(Box::new(MemoryLayer::read_only(location, contents)))
            .unwrap();
        config
    }

    #[test]
    fn test_deserializes_subtree_with_defaults() {
        let config = config(vec![
            Entry::new(key("server/host"), "example.org"),
            Entry::new(key("server/tags"), vec!["a", "b"]),
            Entry::new(key("server/password"), "hunter2"),
            Entry::new(key("other"), true),
        ]);
        config
            .set_scheme(
                Scheme::new()
                    .with_entry(SchemeEntry::new(key("server/port"), EntryType::Number).with_default(8080))
                    .unwrap()
                    .with_entry(SchemeEntry::new(key("server/password"), EntryType::String).secret())
                    .unwrap(),
            )
            .unwrap();

        let server: Server = config.deserialize_at("server").unwrap();
        assert_eq!(
            server,
            Server {
                host: "example.org".to_string(),
                port: 8080,
                tags: vec!["a".to_string(), "b".to_string()],
                password: None,
            }
        );
    }

    #[test]
    fn test_leaf_hides_deeper_keys_and_bytes_become_arrays() {
        let config = config(vec![
            Entry::new(key("a"), 1),
            Entry::new(key("a/b"), 2),
            Entry::new(key("blob"), vec![1u8, 2, 3]),
        ]);
        let tree = config.tree_at("").unwrap();
        assert_eq!(tree, serde_json::json!({"a": 1, "blob": [1, 2, 3]}));
    }

    #[test]
    fn test_type_mismatch_is_a_deserialize_error() {
        let config = config(vec![
            Entry::new(key("server/host"), "h"),
            Entry::new(key("server/port"), "not a port"),
        ]);
        assert!(matches!(
            config.deserialize_at::<Server>("server"),
            Err(ConfigError::Deserialize(_))
        ));
    }
}
