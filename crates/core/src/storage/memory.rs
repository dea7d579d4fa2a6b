//! In-memory storage.
//!
//! Serves the runtime scope by default. Contents survive across configuration
//! instances of the same factory and can be changed from outside through
//! `MemoryStorage::set`, which the change checker then picks up.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::warn;

use super::{DiscoveryInfo, LoadContext, Storage};
use crate::constants::MEMORY_STORAGE_ID;
use crate::entry::{Entry, EntryValue};
use crate::error::{ConfigError, LayerError};
use crate::key::ConfigKey;
use crate::layer::{Layer, LayerContents, MemoryLayer};
use crate::location::Location;
use crate::scope::{Scope, ScopeSet};
use crate::sync::lock;

#[derive(Debug, Default)]
struct MemorySlot {
    name: String,
    contents: LayerContents,
    generation: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// Keyed by layer URI.
    slots: HashMap<String, MemorySlot>,
    /// Generation last seen by a layer or a change check, keyed by layer URI.
    observed: HashMap<String, u64>,
}

/// Storage keeping configuration contents in process memory.
#[derive(Debug)]
pub struct MemoryStorage {
    id: String,
    scopes: ScopeSet,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStorage {
    /// An empty storage serving `scopes`.
    pub fn new(id: impl Into<String>, scopes: ScopeSet) -> Self {
        Self {
            id: id.into(),
            scopes,
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    /// The built-in storage for the runtime scope.
    pub fn runtime() -> Self {
        Self::new(MEMORY_STORAGE_ID, ScopeSet::RUNTIME)
    }

    pub fn scopes(&self) -> ScopeSet {
        self.scopes
    }

    fn scope_location(&self, scope: Scope) -> Result<Location, LayerError> {
        let uri = Location::opaque_uri("memory", &[&self.id, scope.as_str()])?;
        Ok(Location::new(scope, &self.id, uri))
    }

    /// Location of the layer holding configuration `name` in `scope`.
    pub fn layer_location(&self, name: &str, scope: Scope) -> Result<Location, LayerError> {
        Ok(self.scope_location(scope)?.child(name))
    }

    /// Changes a value behind the back of any loaded configuration.
    pub fn set(
        &self,
        name: &str,
        scope: Scope,
        key: &str,
        value: impl Into<EntryValue>,
    ) -> Result<(), ConfigError> {
        let key = ConfigKey::parse(key)?;
        self.mutate(name, scope, |contents| {
            contents.insert(Entry::new(key, value));
        })
    }

    /// Removes a value behind the back of any loaded configuration.
    pub fn unset(&self, name: &str, scope: Scope, key: &str) -> Result<(), ConfigError> {
        let key = ConfigKey::parse(key)?;
        self.mutate(name, scope, |contents| {
            contents.remove(&key);
        })
    }

    /// A copy of the stored contents, if any were stored.
    pub fn snapshot(&self, name: &str, scope: Scope) -> Option<LayerContents> {
        let location = self.layer_location(name, scope).ok()?;
        let state = lock(&self.state);
        state
            .slots
            .get(location.uri().as_str())
            .map(|slot| slot.contents.clone())
    }

    fn mutate(
        &self,
        name: &str,
        scope: Scope,
        change: impl FnOnce(&mut LayerContents),
    ) -> Result<(), ConfigError> {
        if !self.scopes.has(scope) {
            return Err(ConfigError::InvalidUse(format!(
                "memory storage '{}' does not serve scope {scope}",
                self.id
            )));
        }
        let location = self.layer_location(name, scope)?;
        let mut state = lock(&self.state);
        let slot = state
            .slots
            .entry(location.uri().to_string())
            .or_insert_with(|| MemorySlot {
                name: name.to_string(),
                ..MemorySlot::default()
            });
        change(&mut slot.contents);
        slot.generation += 1;
        Ok(())
    }

    fn open_layer(&self, name: &str, location: Location, create: bool) -> Option<Box<dyn Layer>> {
        let slot_key = location.uri().to_string();
        let mut state = lock(&self.state);
        if create {
            state
                .slots
                .entry(slot_key.clone())
                .or_insert_with(|| MemorySlot {
                    name: name.to_string(),
                    ..MemorySlot::default()
                });
        }
        let (contents, generation) = {
            let slot = state.slots.get(&slot_key)?;
            (slot.contents.clone(), slot.generation)
        };
        state.observed.insert(slot_key.clone(), generation);
        Some(Box::new(MemoryBackedLayer {
            inner: MemoryLayer::with_contents(location, contents, true),
            state: Arc::clone(&self.state),
            slot_key,
        }))
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::runtime()
    }
}

impl Storage for MemoryStorage {
    fn id(&self) -> &str {
        &self.id
    }

    fn discover(&self, scope: Scope, _ctx: &LoadContext<'_>) -> Vec<Location> {
        if !self.scopes.has(scope) {
            return Vec::new();
        }
        match self.scope_location(scope) {
            Ok(location) => vec![location],
            Err(e) => {
                warn!(storage = %self.id, scope = %scope, error = %e, "Cannot derive memory location");
                Vec::new()
            }
        }
    }

    fn is_generally_writeable(&self) -> bool {
        true
    }

    fn read_layers(
        &self,
        name: &str,
        location: &Location,
        _ctx: &LoadContext<'_>,
    ) -> Result<Vec<Box<dyn Layer>>, LayerError> {
        let layer_location = location.child(name);
        let exists = lock(&self.state)
            .slots
            .get(layer_location.uri().as_str())
            .is_some_and(|slot| !slot.contents.is_empty());
        if !exists {
            return Ok(Vec::new());
        }
        Ok(self.open_layer(name, layer_location, false).into_iter().collect())
    }

    fn create_layer(
        &self,
        name: &str,
        location: &Location,
        _ctx: &LoadContext<'_>,
    ) -> Result<Option<Box<dyn Layer>>, LayerError> {
        Ok(self.open_layer(name, location.child(name), true))
    }

    fn reload_layer(
        &self,
        name: &str,
        layer_location: &Location,
        _ctx: &LoadContext<'_>,
    ) -> Result<Box<dyn Layer>, LayerError> {
        self.open_layer(name, layer_location.clone(), true)
            .ok_or_else(|| LayerError::InvalidLocation(layer_location.uri().to_string()))
    }

    fn list_configurations(
        &self,
        location: &Location,
        _ctx: &LoadContext<'_>,
    ) -> Vec<DiscoveryInfo> {
        let prefix = format!("{}/", location.uri());
        let state = lock(&self.state);
        state
            .slots
            .iter()
            .filter(|(uri, slot)| uri.starts_with(&prefix) && !slot.contents.is_empty())
            .map(|(_, slot)| DiscoveryInfo {
                name: slot.name.clone(),
                scope: location.scope(),
                uri: location.child(&slot.name).uri().clone(),
                writeable: true,
                format_id: None,
            })
            .collect()
    }

    fn has_changed(&self, layer_location: &Location) -> bool {
        let slot_key = layer_location.uri().as_str();
        let mut state = lock(&self.state);
        let Some(current) = state.slots.get(slot_key).map(|slot| slot.generation) else {
            return false;
        };
        let previous = state.observed.insert(slot_key.to_string(), current);
        previous != Some(current)
    }
}

/// A memory layer that publishes its contents to the storage on flush.
struct MemoryBackedLayer {
    inner: MemoryLayer,
    state: Arc<Mutex<MemoryState>>,
    slot_key: String,
}

impl Layer for MemoryBackedLayer {
    fn location(&self) -> &Location {
        self.inner.location()
    }

    fn entry(&self, key: &ConfigKey) -> Option<Entry> {
        self.inner.entry(key)
    }

    fn keys(&self) -> Option<Vec<ConfigKey>> {
        self.inner.keys()
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn is_writeable(&self) -> bool {
        true
    }

    fn is_dirty(&self) -> bool {
        self.inner.is_dirty()
    }

    fn write_entry(&mut self, entry: Entry) -> Result<Option<Entry>, LayerError> {
        self.inner.write_entry(entry)
    }

    fn remove_entry(&mut self, key: &ConfigKey) -> Result<Option<Entry>, LayerError> {
        self.inner.remove_entry(key)
    }

    fn flush(&mut self) -> Result<usize, LayerError> {
        let written = self.inner.mark_clean();
        if written == 0 {
            return Ok(0);
        }
        let mut state = lock(&self.state);
        let slot = state.slots.entry(self.slot_key.clone()).or_default();
        slot.contents = self.inner.contents().clone();
        slot.generation += 1;
        let generation = slot.generation;
        state.observed.insert(self.slot_key.clone(), generation);
        Ok(written)
    }
}
