//! Secrets exposed as a configuration layer.
//!
//! A key `k` of configuration `name` maps to the provider path `name/k`.
//! Lookups go to the provider every time, so the layer never holds stale
//! secrets and needs no change detection of its own.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{SecretOptions, SecretsProvider};
use crate::entry::Entry;
use crate::error::{LayerError, SecretsError};
use crate::key::ConfigKey;
use crate::layer::Layer;
use crate::location::Location;
use crate::scope::Scope;
use crate::storage::{LoadContext, Storage};

/// A read-only layer resolving keys through a secrets provider.
pub struct SecretsLayer {
    provider: Arc<dyn SecretsProvider>,
    location: Location,
    config_name: String,
}

impl SecretsLayer {
    pub fn new(provider: Arc<dyn SecretsProvider>, location: Location, config_name: &str) -> Self {
        Self {
            provider,
            location,
            config_name: config_name.to_string(),
        }
    }

    fn path_for(&self, key: &ConfigKey) -> String {
        format!("{}/{}", self.config_name, key)
    }

    fn prefix(&self) -> String {
        format!("{}/", self.config_name)
    }
}

impl Layer for SecretsLayer {
    fn location(&self) -> &Location {
        &self.location
    }

    fn entry(&self, key: &ConfigKey) -> Option<Entry> {
        let path = self.path_for(key);
        match self.provider.get_secret(&path, &SecretOptions::default()) {
            Ok(Some(secret)) => {
                Some(Entry::from_secret(key.clone(), &secret).with_location(self.location.clone()))
            }
            Ok(None) | Err(SecretsError::NotFound { .. }) => None,
            Err(e) => {
                warn!(provider = %self.provider.id(), path = %path, error = %e, "Secret lookup failed");
                None
            }
        }
    }

    fn keys(&self) -> Option<Vec<ConfigKey>> {
        let prefix = self.prefix();
        match self.provider.list_secrets(&prefix) {
            Ok(paths) => Some(
                paths
                    .iter()
                    .filter_map(|path| path.strip_prefix(&prefix))
                    .filter_map(|rest| ConfigKey::parse(rest).ok())
                    .collect(),
            ),
            Err(SecretsError::Unsupported { .. }) => None,
            Err(e) => {
                warn!(provider = %self.provider.id(), error = %e, "Listing secrets failed");
                None
            }
        }
    }

    /// Layers that cannot enumerate their secrets report themselves empty.
    fn is_empty(&self) -> bool {
        self.keys().is_none_or(|keys| keys.is_empty())
    }
}

/// Adapts a secrets provider to the storage contract for one scope.
pub struct SecretsStorage {
    id: String,
    provider: Arc<dyn SecretsProvider>,
    scope: Scope,
}

impl SecretsStorage {
    pub fn new(provider: Arc<dyn SecretsProvider>, scope: Scope) -> Self {
        Self {
            id: format!("secrets:{}", provider.id()),
            provider,
            scope,
        }
    }

    pub fn provider(&self) -> &Arc<dyn SecretsProvider> {
        &self.provider
    }
}

impl Storage for SecretsStorage {
    fn id(&self) -> &str {
        &self.id
    }

    fn discover(&self, scope: Scope, _ctx: &LoadContext<'_>) -> Vec<Location> {
        if scope != self.scope {
            return Vec::new();
        }
        match Location::opaque_uri("secrets", &[self.provider.id()]) {
            Ok(uri) => vec![Location::new(scope, &self.id, uri)],
            Err(e) => {
                warn!(storage = %self.id, error = %e, "Cannot derive secrets location");
                Vec::new()
            }
        }
    }

    fn is_generally_writeable(&self) -> bool {
        false
    }

    fn read_layers(
        &self,
        name: &str,
        location: &Location,
        _ctx: &LoadContext<'_>,
    ) -> Result<Vec<Box<dyn Layer>>, LayerError> {
        debug!(storage = %self.id, config = name, "Attaching secrets layer");
        Ok(vec![Box::new(SecretsLayer::new(
            Arc::clone(&self.provider),
            location.child(name),
            name,
        ))])
    }
}
