//! Configuration layers.
//!
//! Responsibilities:
//! - Define the `Layer` contract implemented by every source of entries.
//! - Provide `MemoryLayer`, a contents-backed layer used directly and as the
//!   in-memory half of file and memory storages.
//!
//! Does NOT handle:
//! - Ordering layers against each other (see `layered`).
//! - Reading or writing serialized forms (see `format` and the sources crate).
//!
//! Invariants:
//! - A layer is bound to exactly one `Location` for its whole life.
//! - Entries returned by a layer carry that location as provenance.
//! - Read-only layers reject writes with `LayerError::NotWriteable`.

mod contents;

pub use contents::LayerContents;

use crate::entry::Entry;
use crate::error::LayerError;
use crate::key::ConfigKey;
use crate::location::Location;
use crate::scope::Scope;

/// One source of configuration entries at one location.
pub trait Layer: Send + Sync {
    fn location(&self) -> &Location;

    fn scope(&self) -> Scope {
        self.location().scope()
    }

    fn entry(&self, key: &ConfigKey) -> Option<Entry>;

    /// All keys held by this layer, or `None` when the layer cannot enumerate them.
    fn keys(&self) -> Option<Vec<ConfigKey>>;

    fn is_empty(&self) -> bool;

    fn is_writeable(&self) -> bool {
        false
    }

    /// True when the layer holds changes not yet flushed.
    fn is_dirty(&self) -> bool {
        false
    }

    /// Stores `entry`, returning the entry it replaced.
    fn write_entry(&mut self, _entry: Entry) -> Result<Option<Entry>, LayerError> {
        Err(not_writeable(self.location()))
    }

    fn remove_entry(&mut self, _key: &ConfigKey) -> Result<Option<Entry>, LayerError> {
        Err(not_writeable(self.location()))
    }

    /// Persists pending changes and returns how many were written.
    fn flush(&mut self) -> Result<usize, LayerError> {
        Ok(0)
    }
}

pub(crate) fn not_writeable(location: &Location) -> LayerError {
    LayerError::NotWriteable {
        location: location.uri().to_string(),
    }
}

/// A layer holding its entries in memory.
#[derive(Debug, Clone)]
pub struct MemoryLayer {
    location: Location,
    contents: LayerContents,
    writeable: bool,
    pending: usize,
}

impl MemoryLayer {
    /// An empty writeable layer.
    pub fn new(location: Location) -> Self {
        Self::with_contents(location, LayerContents::new(), true)
    }

    pub fn read_only(location: Location, contents: LayerContents) -> Self {
        Self::with_contents(location, contents, false)
    }

    pub fn with_contents(location: Location, mut contents: LayerContents, writeable: bool) -> Self {
        for entry in contents.entries_mut() {
            *entry = entry.clone().with_location(location.clone());
        }
        Self {
            location,
            contents,
            writeable,
            pending: 0,
        }
    }

    pub fn contents(&self) -> &LayerContents {
        &self.contents
    }

    /// Number of changes since the last call to `mark_clean`.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Records that pending changes were persisted elsewhere.
    pub fn mark_clean(&mut self) -> usize {
        std::mem::take(&mut self.pending)
    }
}

impl Layer for MemoryLayer {
    fn location(&self) -> &Location {
        &self.location
    }

    fn entry(&self, key: &ConfigKey) -> Option<Entry> {
        self.contents.get(key).cloned()
    }

    fn keys(&self) -> Option<Vec<ConfigKey>> {
        Some(self.contents.keys().cloned().collect())
    }

    fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    fn is_writeable(&self) -> bool {
        self.writeable
    }

    fn is_dirty(&self) -> bool {
        self.pending > 0
    }

    fn write_entry(&mut self, entry: Entry) -> Result<Option<Entry>, LayerError> {
        if !self.writeable {
            return Err(not_writeable(&self.location));
        }
        self.pending += 1;
        Ok(self
            .contents
            .insert(entry.with_location(self.location.clone())))
    }

    fn remove_entry(&mut self, key: &ConfigKey) -> Result<Option<Entry>, LayerError> {
        if !self.writeable {
            return Err(not_writeable(&self.location));
        }
        let removed = self.contents.remove(key);
        if removed.is_some() {
            self.pending += 1;
        }
        Ok(removed)
    }

    fn flush(&mut self) -> Result<usize, LayerError> {
        Ok(self.mark_clean())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;

    fn location() -> Location {
        let uri = Location::opaque_uri("memory", &["test"]).unwrap();
        Location::new(Scope::Runtime, "memory", uri)
    }

    fn key(raw: &str) -> ConfigKey {
        ConfigKey::parse(raw).unwrap()
    }

    #[test]
    fn test_written_entries_carry_layer_location() {
        let mut layer = MemoryLayer::new(location());
        layer.write_entry(Entry::new(key("a"), 1)).unwrap();

        let entry = layer.entry(&key("a")).unwrap();
        assert_eq!(entry.location(), Some(&location()));
        assert_eq!(entry.scope(), Some(Scope::Runtime));
    }

    #[test]
    fn test_write_marks_dirty_until_flush() {
        let mut layer = MemoryLayer::new(location());
        assert!(!layer.is_dirty());

        let previous = layer.write_entry(Entry::new(key("a"), "x")).unwrap();
        assert!(previous.is_none());
        let previous = layer.write_entry(Entry::new(key("a"), "y")).unwrap();
        assert_eq!(previous.unwrap().as_string().unwrap(), "x");
        assert!(layer.is_dirty());

        assert_eq!(layer.flush().unwrap(), 2);
        assert!(!layer.is_dirty());
    }

    #[test]
    fn test_read_only_layer_rejects_writes() {
        let contents: LayerContents = [Entry::new(key("a"), true)].into_iter().collect();
        let mut layer = MemoryLayer::read_only(location(), contents);

        assert!(!layer.is_writeable());
        assert!(matches!(
            layer.write_entry(Entry::new(key("b"), 1)),
            Err(LayerError::NotWriteable { .. })
        ));
        assert!(matches!(
            layer.remove_entry(&key("a")),
            Err(LayerError::NotWriteable { .. })
        ));
        assert_eq!(layer.entry(&key("a")).unwrap().location(), Some(&location()));
    }

    #[test]
    fn test_removing_missing_key_is_not_a_change() {
        let mut layer = MemoryLayer::new(location());
        assert!(layer.remove_entry(&key("nope")).unwrap().is_none());
        assert!(!layer.is_dirty());
    }
}
