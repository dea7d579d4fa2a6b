//! Storage contract.
//!
//! Responsibilities:
//! - Define `Storage`, the collaborator that discovers locations and turns them into layers.
//! - Define `LoadContext`, the factory state a storage may consult while loading.
//! - Define `DiscoveryInfo`, one entry of `list_available_configurations`.
//!
//! Does NOT handle:
//! - Ordering locations (the factory sorts the search list).
//! - Parsing serialized content (delegated to `Format`).
//!
//! Invariants:
//! - `has_changed` reports changes since the previous call for the same location and resets.
//! - Storages are shared across configurations and threads; they must be `Send + Sync`.

mod memory;

pub use memory::MemoryStorage;

use std::sync::Arc;

use url::Url;

use crate::error::LayerError;
use crate::format::{Format, FormatOptions};
use crate::key::ConfigKey;
use crate::layer::Layer;
use crate::location::Location;
use crate::scope::Scope;
use crate::settings::Settings;

/// Factory state visible to storages.
#[derive(Clone, Copy)]
pub struct LoadContext<'a> {
    pub settings: &'a Settings,
    /// Formats in reading-priority order.
    pub reading_formats: &'a [Arc<dyn Format>],
    /// Formats in writing-priority order.
    pub writing_formats: &'a [Arc<dyn Format>],
}

impl LoadContext<'_> {
    pub fn format_options(&self) -> FormatOptions {
        FormatOptions::from_settings(self.settings)
    }

    pub fn format(&self, id: &str) -> Option<&Arc<dyn Format>> {
        self.reading_formats.iter().find(|format| format.id() == id)
    }
}

/// A configuration found while listing available configurations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DiscoveryInfo {
    pub name: String,
    pub scope: Scope,
    pub uri: Url,
    pub writeable: bool,
    pub format_id: Option<String>,
}

/// A backend that owns locations and produces layers from them.
pub trait Storage: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str {
        self.id()
    }

    /// Compatibility probe run once when the factory is built.
    fn probe(&self, _settings: &Settings) -> bool {
        true
    }

    /// Locations this storage serves for `scope`.
    fn discover(&self, scope: Scope, ctx: &LoadContext<'_>) -> Vec<Location>;

    fn is_generally_writeable(&self) -> bool;

    /// A reference URI for `key` inside `location`.
    fn uri_for(&self, location: &Location, key: &ConfigKey) -> Url {
        let mut uri = location.uri().clone();
        uri.set_fragment(Some(key.as_str()));
        uri
    }

    /// Layers for configuration `name` at `location`; empty when nothing exists there.
    fn read_layers(
        &self,
        name: &str,
        location: &Location,
        ctx: &LoadContext<'_>,
    ) -> Result<Vec<Box<dyn Layer>>, LayerError>;

    /// Creates a new, empty, writeable layer for `name` at `location`.
    fn create_layer(
        &self,
        _name: &str,
        _location: &Location,
        _ctx: &LoadContext<'_>,
    ) -> Result<Option<Box<dyn Layer>>, LayerError> {
        Ok(None)
    }

    /// Rebuilds the layer at `layer_location` from its current backing state.
    fn reload_layer(
        &self,
        _name: &str,
        _layer_location: &Location,
        _ctx: &LoadContext<'_>,
    ) -> Result<Box<dyn Layer>, LayerError> {
        Err(LayerError::Unsupported {
            storage: self.id().to_string(),
            operation: "reload",
        })
    }

    fn list_configurations(
        &self,
        _location: &Location,
        _ctx: &LoadContext<'_>,
    ) -> Vec<DiscoveryInfo> {
        Vec::new()
    }

    /// True when the backing state changed since the previous check.
    fn has_changed(&self, _layer_location: &Location) -> bool {
        false
    }

    /// Asks the storage to refresh its change state before the next `has_changed`.
    fn trigger_change_check(&self, _layer_location: &Location) {}

    /// Releases resources when the factory closes.
    fn exit(&self) {}
}
