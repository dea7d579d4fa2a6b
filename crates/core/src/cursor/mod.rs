//! Hierarchical cursor over the merged view of a configuration.
//!
//! Responsibilities:
//! - Navigate the key tree formed by the union of all layers' keys.
//! - Expand list and enum-set entries into indexed children.
//! - Map the children of an object onto a `ConfigTarget`.
//!
//! Does NOT handle:
//! - Writing; cursors are read-only views.
//!
//! Invariants:
//! - Sibling lists are snapshots taken when a level is entered.
//! - A key holding an entry is a leaf even when deeper keys exist below it.
//! - Entering a container selects nothing; the first `move_next` selects
//!   its first child.
//! - A failed `move_to` leaves the cursor where it was.

mod target;

pub use target::{ConfigTarget, FieldCase, SetterConvention, Strictness};

use tracing::debug;

use crate::entry::{Entry, EntryType, EntryValue};
use crate::error::ConfigError;
use crate::key::ConfigKey;
use crate::layered::LayeredConfiguration;
use crate::scope::ScopeSet;

/// What the cursor is positioned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// No node selected; the root container.
    Root,
    /// Inside an entered container before any child is selected.
    InContainer,
    OnLeaf,
    OnObject,
    OnList,
}

#[derive(Clone)]
enum FrameKind {
    Object,
    List { items: Vec<EntryValue>, source: Entry },
}

#[derive(Clone)]
struct Frame {
    container: Option<ConfigKey>,
    kind: FrameKind,
    children: Vec<String>,
    position: Option<usize>,
}

enum Node {
    Leaf(Entry),
    Object(ConfigKey),
    List(Entry),
}

pub struct ConfigCursor<'a> {
    config: &'a LayeredConfiguration,
    scopes: ScopeSet,
    frames: Vec<Frame>,
    strictness: Strictness,
}

impl<'a> ConfigCursor<'a> {
    pub(crate) fn new(config: &'a LayeredConfiguration, scopes: ScopeSet) -> Self {
        let mut cursor = Self {
            config,
            scopes,
            frames: Vec::new(),
            strictness: Strictness::default(),
        };
        cursor.reset();
        cursor
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    /// Back to the root with freshly collected top-level keys.
    pub fn reset(&mut self) {
        self.frames = vec![Frame {
            container: None,
            kind: FrameKind::Object,
            children: self.config.child_segments(None, self.scopes),
            position: None,
        }];
    }

    fn frame(&self) -> &Frame {
        // `frames` always holds the root frame.
        &self.frames[self.frames.len() - 1]
    }

    fn frame_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Levels entered below the root.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn state(&self) -> CursorState {
        match self.node() {
            None if self.depth() == 0 => CursorState::Root,
            None => CursorState::InContainer,
            Some(Node::Leaf(_)) => CursorState::OnLeaf,
            Some(Node::Object(_)) => CursorState::OnObject,
            Some(Node::List(_)) => CursorState::OnList,
        }
    }

    /// Segment of the selected node within its container.
    pub fn current_key(&self) -> Option<&str> {
        let frame = self.frame();
        frame.children.get(frame.position?).map(String::as_str)
    }

    /// Full path of the selected node; list elements use their index as segment.
    pub fn current_path(&self) -> Option<ConfigKey> {
        let frame = self.frame();
        let segment = frame.children.get(frame.position?)?;
        ConfigKey::join(frame.container.as_ref(), segment).ok()
    }

    /// The entry of the selected leaf or list; `None` on objects and at the root.
    pub fn current_entry(&self) -> Option<Entry> {
        match self.node()? {
            Node::Leaf(entry) | Node::List(entry) => Some(entry),
            Node::Object(_) => None,
        }
    }

    fn node(&self) -> Option<Node> {
        let frame = self.frame();
        let position = frame.position?;
        let path = self.current_path()?;
        let entry = match &frame.kind {
            FrameKind::Object => match self.config.resolve_node(&path, self.scopes) {
                Some(entry) => entry,
                None => return Some(Node::Object(path)),
            },
            FrameKind::List { items, source } => source
                .clone()
                .with_key(path.clone())
                .with_value(items.get(position)?.clone()),
        };
        Some(match entry.entry_type() {
            EntryType::Object => Node::Object(path),
            kind if kind.is_sequence() => Node::List(entry),
            _ => Node::Leaf(entry),
        })
    }

    pub fn move_next(&mut self) -> bool {
        let frame = self.frame_mut();
        let next = frame.position.map_or(0, |position| position + 1);
        if next >= frame.children.len() {
            return false;
        }
        frame.position = Some(next);
        true
    }

    pub fn move_previous(&mut self) -> bool {
        let frame = self.frame_mut();
        match frame.position {
            Some(position) if position > 0 => {
                frame.position = Some(position - 1);
                true
            }
            _ => false,
        }
    }

    /// Descends into the selected object or list without selecting a child.
    ///
    /// Returns false when the container has no children. Fails on scalar
    /// leaves and when nothing is selected.
    pub fn enter(&mut self) -> Result<bool, ConfigError> {
        let frame = match self.node() {
            None => {
                return Err(ConfigError::InvalidUse(
                    "cursor has no selected entry to enter".to_string(),
                ));
            }
            Some(Node::Leaf(entry)) => {
                return Err(ConfigError::InvalidUse(format!(
                    "cannot enter scalar entry '{}'",
                    entry.key()
                )));
            }
            Some(Node::Object(key)) => Frame {
                children: self.config.child_segments(Some(&key), self.scopes),
                container: Some(key),
                kind: FrameKind::Object,
                position: None,
            },
            Some(Node::List(source)) => {
                let (items, _) = source.value()?.elements().ok_or_else(|| {
                    ConfigError::InvalidUse(format!("entry '{}' has no elements", source.key()))
                })?;
                Frame {
                    children: (0..items.len()).map(|index| index.to_string()).collect(),
                    container: Some(source.key().clone()),
                    kind: FrameKind::List { items, source },
                    position: None,
                }
            }
        };
        if frame.children.is_empty() {
            return Ok(false);
        }
        self.frames.push(frame);
        Ok(true)
    }

    /// Returns to the parent level with the container selected.
    ///
    /// At the top level this clears the selection; fails when nothing is selected there.
    pub fn leave(&mut self) -> Result<(), ConfigError> {
        if self.frames.len() > 1 {
            self.frames.pop();
            return Ok(());
        }
        let root = self.frame_mut();
        if root.position.take().is_none() {
            return Err(ConfigError::InvalidUse(
                "cursor is already at the root".to_string(),
            ));
        }
        Ok(())
    }

    /// Jumps to an absolute path; list indices may appear as segments.
    ///
    /// Returns false, without moving, when the path does not exist. An empty
    /// path selects the root.
    pub fn move_to(&mut self, path: &str) -> Result<bool, ConfigError> {
        if path.trim().trim_matches('/').is_empty() {
            self.reset();
            return Ok(true);
        }
        let target = ConfigKey::parse(path)?;
        let saved = std::mem::take(&mut self.frames);
        self.reset();
        for (depth, segment) in target.segments().enumerate() {
            if depth > 0 && !matches!(self.enter(), Ok(true)) {
                self.frames = saved;
                return Ok(false);
            }
            let frame = self.frame_mut();
            match frame.children.iter().position(|child| child == segment) {
                Some(index) => frame.position = Some(index),
                None => {
                    self.frames = saved;
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Maps the entries directly below the selected object (or the root) onto `target`.
    ///
    /// `prefix` is a relative path below the current object; empty maps the
    /// object itself. Nested objects and keys the target does not accept are
    /// skipped. Returns the number of fields set.
    pub fn copy_map_to_object(
        &self,
        target: &mut dyn ConfigTarget,
        convention: &SetterConvention,
        prefix: &str,
    ) -> Result<usize, ConfigError> {
        let base = match self.node() {
            None => None,
            Some(Node::Object(key)) => Some(key),
            Some(_) => {
                return Err(ConfigError::InvalidUse(
                    "cursor must be on an object to map it".to_string(),
                ));
            }
        };
        let prefix = prefix.trim().trim_matches('/');
        let container = if prefix.is_empty() {
            base
        } else {
            Some(match base {
                Some(base) => base.child(prefix)?,
                None => ConfigKey::parse(prefix)?,
            })
        };

        let mut mapped = 0;
        for segment in self.config.child_segments(container.as_ref(), self.scopes) {
            let key = ConfigKey::join(container.as_ref(), &segment)?;
            let Some(entry) = self.config.resolve_node(&key, self.scopes) else {
                continue;
            };
            if entry.entry_type() == EntryType::Object {
                continue;
            }
            let field = convention.field_name(&segment);
            if !target.accepts(&field) {
                continue;
            }
            match target.set_field(&field, &entry) {
                Ok(()) => mapped += 1,
                Err(e) if self.strictness == Strictness::Strict => return Err(e),
                Err(e) => debug!(key = %key, field = %field, error = %e, "Skipping unmappable entry"),
            }
        }
        Ok(mapped)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;
    use crate::layer::{LayerContents, MemoryLayer};
    use crate::location::Location;
    use crate::scope::Scope;
    use crate::settings::Settings;

    fn key(raw: &str) -> ConfigKey {
        ConfigKey::parse(raw).unwrap()
    }

    fn config() -> Arc<LayeredConfiguration> {
        let config = LayeredConfiguration::standalone("app", Settings::new("acme", "demo")).unwrap();
        let user: LayerContents = [
            Entry::new(key("server/host"), "localhost"),
            Entry::new(key("server/port"), 8080),
            Entry::new(key("server/tags"), vec!["a", "b", "c"]),
            Entry::new(key("name"), "demo"),
        ]
        .into_iter()
        .collect();
        let host: LayerContents = [
            Entry::new(key("server/timeout"), 30),
            Entry::new(key("modes"), EntryValue::EnumSet(vec!["fast".into(), "safe".into()])),
        ]
        .into_iter()
        .collect();
        let location = |scope: Scope| {
            Location::new(scope, "manual", Location::opaque_uri("manual", &[scope.as_str()]).unwrap())
        };
        config
            .add_layer(Box::new(MemoryLayer::read_only(location(Scope::User), user)))
            .unwrap();
        config
            .add_layer(Box::new(MemoryLayer::read_only(location(Scope::Host), host)))
            .unwrap();
        config
    }

    #[test]
    fn test_walks_sorted_union_of_keys() {
        let config = config();
        let mut cursor = config.cursor().unwrap();
        assert_eq!(cursor.state(), CursorState::Root);
        assert!(!cursor.move_previous());

        let mut top = Vec::new();
        while cursor.move_next() {
            top.push(cursor.current_key().unwrap().to_string());
        }
        assert_eq!(top, vec!["modes", "name", "server"]);
        assert_eq!(cursor.state(), CursorState::OnObject);

        assert!(cursor.enter().unwrap());
        assert_eq!(cursor.state(), CursorState::InContainer);
        assert_eq!(cursor.current_key(), None);
        assert!(!cursor.move_previous());
        let mut children = Vec::new();
        while cursor.move_next() {
            children.push(cursor.current_key().unwrap().to_string());
        }
        assert_eq!(children, vec!["host", "port", "tags", "timeout"]);
        assert!(!cursor.move_next());
    }

    #[test]
    fn test_list_expands_into_indexed_children() {
        let config = config();
        let mut cursor = config.cursor().unwrap();
        assert!(cursor.move_to("server/tags").unwrap());
        assert_eq!(cursor.state(), CursorState::OnList);

        assert!(cursor.enter().unwrap());
        assert!(cursor.current_entry().is_none());
        assert!(cursor.move_next());
        assert_eq!(cursor.current_key(), Some("0"));
        assert!(cursor.move_next());
        let entry = cursor.current_entry().unwrap();
        assert_eq!(entry.key(), &key("server/tags/1"));
        assert_eq!(entry.as_string().unwrap(), "b");
        assert_eq!(cursor.state(), CursorState::OnLeaf);

        cursor.leave().unwrap();
        assert_eq!(cursor.current_path(), Some(key("server/tags")));
    }

    #[test]
    fn test_enum_set_elements_are_enums() {
        let config = config();
        let mut cursor = config.cursor().unwrap();
        assert!(cursor.move_to("modes/1").unwrap());
        let entry = cursor.current_entry().unwrap();
        assert_eq!(entry.entry_type(), EntryType::Enum);
        assert_eq!(entry.as_string().unwrap(), "safe");
        assert_eq!(entry.scope(), Some(Scope::Host));
    }

    #[test]
    fn test_enter_leaf_fails_and_leave_at_root_fails() {
        let config = config();
        let mut cursor = config.cursor().unwrap();
        assert!(cursor.leave().is_err());
        assert!(matches!(cursor.enter(), Err(ConfigError::InvalidUse(_))));

        assert!(cursor.move_to("name").unwrap());
        assert!(matches!(cursor.enter(), Err(ConfigError::InvalidUse(_))));
        cursor.leave().unwrap();
        assert_eq!(cursor.state(), CursorState::Root);
    }

    #[test]
    fn test_leave_from_unselected_container_restores_parent() {
        let config = config();
        let mut cursor = config.cursor().unwrap();
        assert!(cursor.move_to("server").unwrap());
        assert!(cursor.enter().unwrap());
        assert_eq!(cursor.depth(), 1);

        cursor.leave().unwrap();
        assert_eq!(cursor.depth(), 0);
        assert_eq!(cursor.current_path(), Some(key("server")));
        assert_eq!(cursor.state(), CursorState::OnObject);
    }

    #[test]
    fn test_failed_move_to_keeps_position() {
        let config = config();
        let mut cursor = config.cursor().unwrap();
        assert!(cursor.move_to("server/port").unwrap());
        assert!(!cursor.move_to("server/missing").unwrap());
        assert!(!cursor.move_to("name/deeper").unwrap());
        assert!(!cursor.move_to("server/tags/7").unwrap());
        assert_eq!(cursor.current_path(), Some(key("server/port")));
        assert_eq!(cursor.depth(), 1);

        assert!(cursor.move_to("").unwrap());
        assert_eq!(cursor.state(), CursorState::Root);
    }

    #[derive(Default)]
    struct Server {
        fields: BTreeMap<String, String>,
        port: Option<u16>,
    }

    impl ConfigTarget for Server {
        fn accepts(&self, field: &str) -> bool {
            matches!(field, "host" | "port" | "timeout")
        }

        fn set_field(&mut self, field: &str, entry: &Entry) -> Result<(), ConfigError> {
            if field == "port" {
                let port = entry.as_i64()?;
                self.port = Some(u16::try_from(port).map_err(|_| ConfigError::Conversion {
                    key: entry.key().to_string(),
                    expected: "u16",
                    found: entry.entry_type(),
                })?);
            } else {
                self.fields.insert(field.to_string(), entry.as_string()?);
            }
            Ok(())
        }
    }

    #[test]
    fn test_copy_map_to_object() {
        let config = config();
        let cursor = config.cursor().unwrap();
        let mut server = Server::default();

        let mapped = cursor
            .copy_map_to_object(&mut server, &SetterConvention::snake_case(), "server")
            .unwrap();
        assert_eq!(mapped, 3);
        assert_eq!(server.port, Some(8080));
        assert_eq!(server.fields.get("host").map(String::as_str), Some("localhost"));
        assert_eq!(server.fields.get("timeout").map(String::as_str), Some("30"));
    }

    #[test]
    fn test_copy_map_requires_object() {
        let config = config();
        let mut cursor = config.cursor().unwrap();
        assert!(cursor.move_to("name").unwrap());
        assert!(cursor
            .copy_map_to_object(&mut Server::default(), &SetterConvention::snake_case(), "")
            .is_err());
    }

    struct Picky;

    impl ConfigTarget for Picky {
        fn accepts(&self, _field: &str) -> bool {
            true
        }

        fn set_field(&mut self, _field: &str, entry: &Entry) -> Result<(), ConfigError> {
            entry.as_bool().map(|_| ())
        }
    }

    #[test]
    fn test_strictness_controls_mismatches() {
        let config = config();
        let mut cursor = config.cursor().unwrap();
        assert!(cursor.move_to("server").unwrap());

        assert_eq!(
            cursor
                .copy_map_to_object(&mut Picky, &SetterConvention::snake_case(), "")
                .unwrap(),
            0
        );
        let cursor = cursor.with_strictness(Strictness::Strict);
        assert!(matches!(
            cursor.copy_map_to_object(&mut Picky, &SetterConvention::snake_case(), ""),
            Err(ConfigError::Conversion { .. })
        ));
    }
}
