//! Tree formats.
//!
//! Responsibilities:
//! - Provide `JsonFormat` and `TomlFormat`.
//! - Convert between nested documents and flat contents keyed by full keys.
//!
//! Does NOT handle:
//! - Locating or writing files (see `file`).
//!
//! Invariants:
//! - Nested tables become `/`-separated keys; arrays of scalars become lists.
//! - Byte values travel as `{"$bytes": "<hex>"}`.
//! - Parse errors report positions only, never document content.

mod json;
mod toml;

pub use json::JsonFormat;
pub use self::toml::TomlFormat;

use serde_json::{Map, Value};
use tracing::warn;

use layerconf::entry::is_bytes_marker;
use layerconf::{ConfigKey, Entry, EntryValue, LayerContents, LayerError, Location};

/// Flattens a document into contents; the top level must be a table.
pub(crate) fn flatten(document: Value, location: &Location) -> Result<LayerContents, LayerError> {
    let Value::Object(root) = document else {
        return Err(LayerError::Parse {
            location: location.uri().to_string(),
            message: "top level must be a table".to_string(),
        });
    };
    let mut contents = LayerContents::new();
    flatten_into(&root, None, location, &mut contents)?;
    Ok(contents)
}

fn flatten_into(
    table: &Map<String, Value>,
    prefix: Option<&ConfigKey>,
    location: &Location,
    contents: &mut LayerContents,
) -> Result<(), LayerError> {
    for (name, value) in table {
        let key = ConfigKey::join(prefix, name).map_err(|e| LayerError::Parse {
            location: location.uri().to_string(),
            message: e.to_string(),
        })?;
        match value {
            Value::Object(nested) if !is_bytes_marker(nested) => {
                flatten_into(nested, Some(&key), location, contents)?;
            }
            Value::Null => {}
            other => match EntryValue::from_json(other) {
                Some(value) => {
                    contents.insert(Entry::new(key, value));
                }
                None => warn!(
                    location = %location,
                    key = %key,
                    "Skipping value that is neither a scalar nor a list of scalars"
                ),
            },
        }
    }
    Ok(())
}

/// Rebuilds the nested document for `contents`.
pub(crate) fn nest(contents: &LayerContents, location: &Location) -> Result<Map<String, Value>, LayerError> {
    let mut root = Map::new();
    for entry in contents.entries() {
        let encode_error = |message: String| LayerError::Encode {
            location: location.uri().to_string(),
            message,
        };
        let value = entry
            .value()
            .map_err(|_| encode_error(format!("entry '{}' is sealed", entry.key())))?;
        insert(&mut root, entry.key(), value.to_json()).map_err(encode_error)?;
    }
    Ok(root)
}

fn insert(root: &mut Map<String, Value>, key: &ConfigKey, value: Value) -> Result<(), String> {
    let segments: Vec<&str> = key.segments().collect();
    let Some((leaf, parents)) = segments.split_last() else {
        return Ok(());
    };
    let mut table = root;
    for (depth, segment) in parents.iter().enumerate() {
        let slot = table
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        table = match slot {
            Value::Object(nested) if !is_bytes_marker(nested) => nested,
            _ => {
                return Err(format!(
                    "key '{key}' conflicts with the value at '{}'",
                    segments[..=depth].join("/")
                ));
            }
        };
    }
    let has_children = matches!(
        table.get(*leaf),
        Some(Value::Object(nested)) if !nested.is_empty() && !is_bytes_marker(nested)
    );
    if has_children {
        return Err(format!("key '{key}' conflicts with nested keys below it"));
    }
    table.insert((*leaf).to_string(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use layerconf::Scope;
    use serde_json::json;

    fn location() -> Location {
        let uri = Location::opaque_uri("test", &["doc"]).unwrap();
        Location::new(Scope::User, "test", uri)
    }

    fn key(raw: &str) -> ConfigKey {
        ConfigKey::parse(raw).unwrap()
    }

    #[test]
    fn test_flatten_nested_tables() {
        let document = json!({
            "net": {"port": 8080, "hosts": ["a", "b"]},
            "blob": {"$bytes": "0a0b"},
            "empty": null,
        });
        let contents = flatten(document, &location()).unwrap();

        assert_eq!(contents.len(), 3);
        assert_eq!(contents.get(&key("net/port")).unwrap().as_i64().unwrap(), 8080);
        assert_eq!(
            contents.get(&key("net/hosts")).unwrap().as_list().unwrap(),
            vec!["a", "b"]
        );
        assert_eq!(
            contents.get(&key("blob")).unwrap().as_bytes().unwrap(),
            vec![0x0a, 0x0b]
        );
    }

    #[test]
    fn test_top_level_must_be_table() {
        let err = flatten(json!([1, 2]), &location()).unwrap_err();
        assert!(matches!(err, LayerError::Parse { .. }));
    }

    #[test]
    fn test_nest_rebuilds_tree() {
        let contents: LayerContents = [
            Entry::new(key("net/port"), 8080),
            Entry::new(key("net/host"), "example.org"),
            Entry::new(key("debug"), true),
        ]
        .into_iter()
        .collect();

        let tree = nest(&contents, &location()).unwrap();
        assert_eq!(
            Value::Object(tree),
            json!({"debug": true, "net": {"host": "example.org", "port": 8080}})
        );
    }

    #[test]
    fn test_nest_reports_leaf_and_table_conflict() {
        let contents: LayerContents = [Entry::new(key("a"), 1), Entry::new(key("a/b"), 2)]
            .into_iter()
            .collect();
        let err = nest(&contents, &location()).unwrap_err();
        assert!(matches!(err, LayerError::Encode { .. }));
    }

    #[test]
    fn test_nest_rejects_sealed_entries() {
        let contents: LayerContents = [Entry::new(key("token"), "hunter2").into_secret()]
            .into_iter()
            .collect();
        let err = nest(&contents, &location()).unwrap_err();
        assert!(!err.to_string().contains("hunter2"));
    }
}
