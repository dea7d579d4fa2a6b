//! Configuration factory.
//!
//! Responsibilities:
//! - Hand out one open `LayeredConfiguration` per name, loading its layers from
//!   every location of the search list.
//! - Own the scheme registry and the search list shared by its configurations.
//! - Close every configuration and storage when the factory closes.
//!
//! Does NOT handle:
//! - Assembling collaborators (see `builder`).
//!
//! Invariants:
//! - Configurations are cached weakly; dropping every handle lets the factory forget one.
//! - The search list is frozen by the first `get_config`.
//! - A closed factory rejects every operation with `ConfigError::Closed`.

mod builder;
mod context;
mod env;
mod name;

pub use builder::ConfigFactoryBuilder;
pub(crate) use context::FactoryContext;
pub use env::{apply_env, env_var_or_none};
pub use name::sanitize_config_name;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::layered::{ConfigCache, FlushReport, LayeredConfiguration};
use crate::location::Location;
use crate::scheme::Scheme;
use crate::search_list::SearchList;
use crate::settings::Settings;
use crate::storage::DiscoveryInfo;
use crate::sync::{lock, write};

pub struct ConfigFactory {
    context: Arc<FactoryContext>,
    cache: Arc<ConfigCache>,
    closed: AtomicBool,
}

impl ConfigFactory {
    /// Shorthand for `ConfigFactoryBuilder::new`.
    pub fn builder(
        company_name: impl Into<String>,
        application_name: impl Into<String>,
    ) -> ConfigFactoryBuilder {
        ConfigFactoryBuilder::new(company_name, application_name)
    }

    fn from_context(context: FactoryContext) -> Self {
        Self {
            context: Arc::new(context),
            cache: Arc::new(Mutex::new(HashMap::new())),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), ConfigError> {
        if self.is_closed() {
            return Err(ConfigError::Closed {
                what: "configuration factory".to_string(),
            });
        }
        Ok(())
    }

    /// True once `close` ran.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Settings evaluated at build time.
    pub fn settings(&self) -> &Settings {
        &self.context.settings
    }

    /// Ids of the active storages in priority order.
    pub fn storage_ids(&self) -> Vec<String> {
        self.context
            .storages
            .iter()
            .map(|storage| storage.id().to_string())
            .collect()
    }

    /// Id of the log sink selected at build time.
    pub fn log_sink_id(&self) -> &str {
        self.context.log_sink.id()
    }

    /// The open configuration `name`, loading it on first use.
    pub fn get_config(&self, name: &str) -> Result<Arc<LayeredConfiguration>, ConfigError> {
        self.ensure_open()?;
        let name = sanitize_config_name(name)?;

        let mut cache = lock(&self.cache);
        if let Some(config) = cache.get(&name).and_then(|weak| weak.upgrade()) {
            if !config.is_closed() {
                return Ok(config);
            }
        }
        self.context.freeze_search_list();

        let scheme = self
            .context
            .schemes
            .get(&name)
            .unwrap_or_else(|| Arc::new(Scheme::new()));
        let config = Arc::new(LayeredConfiguration::with_context(
            name.clone(),
            Arc::clone(&self.context),
            scheme,
            Arc::downgrade(&self.cache),
        ));

        let ctx = self.context.load_context();
        for location in self.context.search_list().locations() {
            let Some(storage) = self.context.storage(location.storage_id()) else {
                continue;
            };
            match storage.read_layers(&name, location, &ctx) {
                Ok(layers) => {
                    for layer in layers {
                        config.attach(layer, Some(Arc::clone(storage)));
                    }
                }
                Err(e) => warn!(
                    config = %name,
                    location = %location,
                    error = %e,
                    "Skipping layer that failed to load"
                ),
            }
        }

        if config.layer_count() == 0 && self.context.settings.exception_when_configuration_not_found {
            return Err(ConfigError::NoConfigurationFound { name });
        }
        debug!(config = %name, layers = config.layer_count(), "Configuration loaded");
        cache.insert(name, Arc::downgrade(&config));
        Ok(config)
    }

    /// Every configuration any storage can find at any location of the search list.
    pub fn list_available_configurations(&self) -> Result<Vec<DiscoveryInfo>, ConfigError> {
        self.ensure_open()?;
        let ctx = self.context.load_context();
        let found: BTreeSet<DiscoveryInfo> = self
            .context
            .search_list()
            .locations()
            .iter()
            .filter_map(|location| {
                self.context
                    .storage(location.storage_id())
                    .map(|storage| storage.list_configurations(location, &ctx))
            })
            .flatten()
            .collect();
        Ok(found.into_iter().collect())
    }

    /// A copy of the search list.
    pub fn search_list(&self) -> SearchList {
        self.context.search_list()
    }

    /// Adds a location before the first configuration is resolved.
    ///
    /// Returns false when an equal location is already listed.
    pub fn add_location(&self, location: Location) -> Result<bool, ConfigError> {
        self.ensure_open()?;
        if self.context.storage(location.storage_id()).is_none() {
            return Err(ConfigError::InvalidUse(format!(
                "no storage with id '{}'",
                location.storage_id()
            )));
        }
        let storages = &self.context.storages;
        let mut search_list = write(&self.context.search_list);
        let added = search_list.push(location)?;
        search_list.sort(&self.context.settings.scope_order, |id| {
            storages
                .iter()
                .position(|storage| storage.id() == id)
                .unwrap_or(storages.len())
        });
        Ok(added)
    }

    /// Registers `scheme` for `config_name`; an open configuration of that name adopts it.
    pub fn register_scheme(&self, config_name: &str, scheme: Scheme) -> Result<(), ConfigError> {
        self.ensure_open()?;
        let name = sanitize_config_name(config_name)?;
        self.context.schemes.register(&name, scheme.clone());
        let open = lock(&self.cache).get(&name).and_then(|weak| weak.upgrade());
        if let Some(config) = open.filter(|config| !config.is_closed()) {
            config.set_scheme(scheme)?;
        }
        Ok(())
    }

    /// Registers the schemes of a JSON document; returns how many were registered.
    ///
    /// An unnamed document applies to `default_name`.
    pub fn add_scheme_json(&self, json: &str, default_name: Option<&str>) -> Result<usize, ConfigError> {
        self.ensure_open()?;
        let schemes = Scheme::parse_document(json, default_name)?;
        let count = schemes.len();
        for (name, scheme) in schemes {
            self.register_scheme(&name, scheme)?;
        }
        Ok(count)
    }

    /// The registered scheme for `config_name`, if any.
    pub fn scheme(&self, config_name: &str) -> Option<Arc<Scheme>> {
        let name = sanitize_config_name(config_name).ok()?;
        self.context.schemes.get(&name)
    }

    /// Closes every open configuration and every storage. Idempotent.
    pub fn close(&self) -> FlushReport {
        if self.closed.swap(true, Ordering::SeqCst) {
            return FlushReport::default();
        }
        let open: Vec<Arc<LayeredConfiguration>> = lock(&self.cache)
            .drain()
            .filter_map(|(_, weak)| weak.upgrade())
            .collect();
        let mut report = FlushReport::default();
        for config in open {
            report.merge(config.close());
        }
        for storage in &self.context.storages {
            storage.exit();
        }
        info!(failures = report.failures().count(), "Configuration factory closed");
        report
    }
}

impl Drop for ConfigFactory {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ConfigFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigFactory")
            .field("company", &self.context.settings.company_name)
            .field("application", &self.context.settings.application_name)
            .field("storages", &self.storage_ids())
            .field("closed", &self.is_closed())
            .finish()
    }
}
