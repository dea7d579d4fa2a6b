//! Flat, ordered layer contents keyed by full configuration keys.

use std::collections::BTreeMap;
use std::collections::btree_map;

use crate::entry::Entry;
use crate::key::ConfigKey;

/// Entries of one layer. Tree formats rebuild nesting from the full keys.
#[derive(Debug, Clone, Default)]
pub struct LayerContents {
    entries: BTreeMap<ConfigKey, Entry>,
    header_comment: Option<String>,
}

impl LayerContents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry, returning the one it replaced.
    pub fn insert(&mut self, entry: Entry) -> Option<Entry> {
        self.entries.insert(entry.key().clone(), entry)
    }

    pub fn remove(&mut self, key: &ConfigKey) -> Option<Entry> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &ConfigKey) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &ConfigKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ConfigKey> {
        self.entries.keys()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut Entry> {
        self.entries.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn header_comment(&self) -> Option<&str> {
        self.header_comment.as_deref()
    }

    pub fn set_header_comment(&mut self, comment: Option<String>) {
        self.header_comment = comment;
    }
}

impl FromIterator<Entry> for LayerContents {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        let mut contents = LayerContents::new();
        for entry in iter {
            contents.insert(entry);
        }
        contents
    }
}

impl IntoIterator for LayerContents {
    type Item = Entry;
    type IntoIter = btree_map::IntoValues<ConfigKey, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_values()
    }
}
