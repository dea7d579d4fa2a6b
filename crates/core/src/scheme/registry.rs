//! Concurrent scheme registry and the scheme provider contract.

use std::sync::Arc;

use dashmap::DashMap;

use super::Scheme;
use crate::error::ConfigError;
use crate::settings::Settings;

/// Discovers schemes when a factory is built.
pub trait SchemeProvider: Send + Sync {
    fn id(&self) -> &str;

    /// Schemes keyed by configuration name.
    fn discover(&self, settings: &Settings) -> Result<Vec<(String, Scheme)>, ConfigError>;
}

/// Schemes by configuration name, shared by every configuration of a factory.
#[derive(Debug, Default)]
pub struct SchemeRegistry {
    schemes: DashMap<String, Arc<Scheme>>,
}

impl SchemeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `scheme` for `name`, returning the scheme it replaced.
    pub fn register(&self, name: &str, scheme: Scheme) -> Option<Arc<Scheme>> {
        self.schemes.insert(name.to_string(), Arc::new(scheme))
    }

    pub fn get(&self, name: &str) -> Option<Arc<Scheme>> {
        self.schemes.get(name).map(|scheme| Arc::clone(scheme.value()))
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Scheme>> {
        self.schemes.remove(name).map(|(_, scheme)| scheme)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemes.iter().map(|item| item.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }
}
