//! Configuration factory builder.
//!
//! Responsibilities:
//! - Collect settings and collaborators (storages, formats, scheme providers,
//!   secrets providers, log sinks) through `with_*` methods.
//! - Build the provider registry, the search list and the scheme registry.
//!
//! Does NOT handle:
//! - Resolving configurations (see `ConfigFactory::get_config`).
//!
//! Invariants / Assumptions:
//! - `build()` fails only on malformed builder input, with `ConfigError::FactoryInit`.
//! - Failures of individual collaborators (a scheme provider, a probe) are logged
//!   and the collaborator is left out.
//! - The built-in memory storage serves the runtime scope unless a storage with
//!   the same id was registered or the id is disabled.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::context::FactoryContext;
use super::env::apply_env;
use super::name::sanitize_config_name;
use super::ConfigFactory;
use crate::constants::{MAX_LOG_LEVEL, MEMORY_STORAGE_ID};
use crate::error::ConfigError;
use crate::format::Format;
use crate::logging::{LogSink, install_sink};
use crate::scheme::{Scheme, SchemeProvider, SchemeRegistry};
use crate::scope::{Scope, ScopeOrder, ScopeSet};
use crate::search_list::SearchList;
use crate::secrets::{SecretsProvider, SecretsStorage};
use crate::settings::Settings;
use crate::storage::{LoadContext, MemoryStorage, Storage};

/// Builder for a `ConfigFactory`.
pub struct ConfigFactoryBuilder {
    settings: Settings,
    storages: Vec<Arc<dyn Storage>>,
    formats: Vec<Arc<dyn Format>>,
    scheme_providers: Vec<Arc<dyn SchemeProvider>>,
    schemes: Vec<(String, Scheme)>,
    scheme_documents: Vec<String>,
    secrets_providers: Vec<(Arc<dyn SecretsProvider>, Scope)>,
    log_sinks: Vec<Arc<dyn LogSink>>,
}

impl ConfigFactoryBuilder {
    /// Starts a builder for the application identity (company, application).
    pub fn new(company_name: impl Into<String>, application_name: impl Into<String>) -> Self {
        Self {
            settings: Settings::new(company_name, application_name),
            storages: Vec::new(),
            formats: Vec::new(),
            scheme_providers: Vec::new(),
            schemes: Vec::new(),
            scheme_documents: Vec::new(),
            secrets_providers: Vec::new(),
            log_sinks: Vec::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Applies `LAYERCONF_*` environment overrides on top of the current settings.
    pub fn from_env(mut self) -> Result<Self, ConfigError> {
        apply_env(&mut self.settings)?;
        Ok(self)
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_sub_path(mut self, sub_path: impl Into<PathBuf>) -> Self {
        self.settings.sub_path = Some(sub_path.into());
        self
    }

    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.settings.test_mode = test_mode;
        self
    }

    /// A directory that replaces the defaults of `scope` in test mode.
    pub fn with_test_directory(mut self, scope: Scope, directory: impl Into<PathBuf>) -> Self {
        self.settings
            .test_mode_directories
            .entry(scope)
            .or_default()
            .push(directory.into());
        self
    }

    pub fn with_additional_directory(mut self, scope: Scope, directory: impl Into<PathBuf>) -> Self {
        self.settings
            .additional_directories
            .entry(scope)
            .or_default()
            .push(directory.into());
        self
    }

    pub fn with_no_default_directories(mut self, disabled: bool) -> Self {
        self.settings.no_default_directories = disabled;
        self
    }

    pub fn with_automatic_config_creation(mut self, enabled: bool) -> Self {
        self.settings.automatic_config_creation = enabled;
        self
    }

    pub fn with_write_sync(mut self, write_sync: bool) -> Self {
        self.settings.write_sync = write_sync;
        self
    }

    pub fn with_exception_on_missing_entry(mut self, enabled: bool) -> Self {
        self.settings.exception_on_missing_entry = enabled;
        self
    }

    pub fn with_exception_when_configuration_not_found(mut self, enabled: bool) -> Self {
        self.settings.exception_when_configuration_not_found = enabled;
        self
    }

    pub fn with_format_reading_priorities<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings.format_reading_priorities = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_format_writing_priorities<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings.format_writing_priorities = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_storage_priorities<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings.storage_priorities = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_disabled_module(mut self, id: impl Into<String>) -> Self {
        self.settings.disabled_module_ids.push(id.into());
        self
    }

    pub fn with_comments_reading(mut self, enabled: bool) -> Self {
        self.settings.comments_reading = enabled;
        self
    }

    pub fn with_comments_writing(mut self, enabled: bool) -> Self {
        self.settings.comments_writing = enabled;
        self
    }

    pub fn with_description_on_create(mut self, enabled: bool) -> Self {
        self.settings.description_on_create = enabled;
        self
    }

    pub fn with_log_level(mut self, level: u8) -> Self {
        self.settings.log_level = level;
        self
    }

    pub fn with_write_condensed_format(mut self, condensed: bool) -> Self {
        self.settings.write_condensed_format = condensed;
        self
    }

    pub fn with_update_check_scopes(mut self, scopes: ScopeSet) -> Self {
        self.settings.update_check_scopes = scopes;
        self
    }

    pub fn with_update_check_interval(mut self, interval: Duration) -> Self {
        self.settings.update_check_interval = interval;
        self
    }

    pub fn with_scope_order(mut self, order: ScopeOrder) -> Self {
        self.settings.scope_order = order;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storages.push(storage);
        self
    }

    pub fn with_format(mut self, format: Arc<dyn Format>) -> Self {
        self.formats.push(format);
        self
    }

    pub fn with_scheme_provider(mut self, provider: Arc<dyn SchemeProvider>) -> Self {
        self.scheme_providers.push(provider);
        self
    }

    pub fn with_scheme(mut self, config_name: impl Into<String>, scheme: Scheme) -> Self {
        self.schemes.push((config_name.into(), scheme));
        self
    }

    /// A JSON scheme document naming its configuration(s).
    pub fn with_scheme_json(mut self, json: impl Into<String>) -> Self {
        self.scheme_documents.push(json.into());
        self
    }

    /// Serves the provider's secrets as a read-only layer in `scope`.
    pub fn with_secrets_provider(mut self, provider: Arc<dyn SecretsProvider>, scope: Scope) -> Self {
        self.secrets_providers.push((provider, scope));
        self
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sinks.push(sink);
        self
    }

    /// Builds the factory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::FactoryInit` if:
    /// - the company or application name is empty or contains a path separator
    /// - the log level is out of range
    /// - two storages or two formats share an id
    /// - a scheme added to the builder is malformed or names an invalid configuration
    pub fn build(self) -> Result<ConfigFactory, ConfigError> {
        let settings = self.settings;
        validate_identity(&settings)?;
        if settings.log_level > MAX_LOG_LEVEL {
            return Err(init_error(format!(
                "log level {} is above {MAX_LOG_LEVEL}",
                settings.log_level
            )));
        }

        let storages = select_storages(&settings, self.storages, self.secrets_providers)?;
        let formats = select_formats(&settings, self.formats)?;
        let reading_formats = order_by_priority(&formats, &settings.format_reading_priorities, |f| f.id());
        let writing_formats = order_by_priority(&formats, &settings.format_writing_priorities, |f| f.id());

        let search_list = {
            let ctx = LoadContext {
                settings: &settings,
                reading_formats: &reading_formats,
                writing_formats: &writing_formats,
            };
            discover_locations(&storages, &ctx)
        };

        let schemes = SchemeRegistry::new();
        for (name, scheme) in self.schemes {
            let name = sanitize_config_name(&name).map_err(|e| init_error(e.to_string()))?;
            schemes.register(&name, scheme);
        }
        for document in &self.scheme_documents {
            let parsed = Scheme::parse_document(document, None).map_err(|e| init_error(e.to_string()))?;
            for (name, scheme) in parsed {
                let name = sanitize_config_name(&name).map_err(|e| init_error(e.to_string()))?;
                schemes.register(&name, scheme);
            }
        }
        for provider in &self.scheme_providers {
            if settings.is_disabled(provider.id()) {
                continue;
            }
            match provider.discover(&settings) {
                Ok(found) => {
                    for (name, scheme) in found {
                        match sanitize_config_name(&name) {
                            Ok(name) => {
                                schemes.register(&name, scheme);
                            }
                            Err(e) => warn!(provider = %provider.id(), error = %e, "Skipping scheme"),
                        }
                    }
                }
                Err(e) => warn!(provider = %provider.id(), error = %e, "Scheme discovery failed"),
            }
        }

        let log_sink = install_sink(
            &self.log_sinks,
            |id| settings.is_disabled(id),
            settings.level_filter(),
        );

        info!(
            company = %settings.company_name,
            application = %settings.application_name,
            storages = storages.len(),
            locations = search_list.len(),
            schemes = schemes.len(),
            log_sink = %log_sink.id(),
            "Configuration factory ready"
        );

        let context = FactoryContext {
            settings,
            storages,
            reading_formats,
            writing_formats,
            search_list: RwLock::new(search_list),
            schemes,
            log_sink,
        };
        Ok(ConfigFactory::from_context(context))
    }
}

fn init_error(reason: impl Into<String>) -> ConfigError {
    ConfigError::FactoryInit {
        reason: reason.into(),
    }
}

fn validate_identity(settings: &Settings) -> Result<(), ConfigError> {
    for (what, value) in [
        ("company name", &settings.company_name),
        ("application name", &settings.application_name),
    ] {
        if value.trim().is_empty() {
            return Err(init_error(format!("{what} must not be empty")));
        }
        if value.contains(['/', '\\']) || value.chars().any(char::is_control) {
            return Err(init_error(format!("{what} '{value}' contains invalid characters")));
        }
    }
    Ok(())
}

/// Rank of `id` in `priorities`; unlisted ids rank after all listed ones.
///
/// A priority entry matches an id exactly or as the part before a `:`
/// (`secrets` matches `secrets:keyring`).
fn priority_rank(priorities: &[String], id: &str) -> usize {
    priorities
        .iter()
        .position(|entry| {
            entry.eq_ignore_ascii_case(id)
                || id
                    .split_once(':')
                    .is_some_and(|(family, _)| entry.eq_ignore_ascii_case(family))
        })
        .unwrap_or(priorities.len())
}

fn order_by_priority<T: ?Sized>(
    items: &[Arc<T>],
    priorities: &[String],
    id: impl Fn(&T) -> &str,
) -> Vec<Arc<T>> {
    let mut ordered = items.to_vec();
    ordered.sort_by_key(|item| priority_rank(priorities, id(item.as_ref())));
    ordered
}

fn select_storages(
    settings: &Settings,
    registered: Vec<Arc<dyn Storage>>,
    secrets: Vec<(Arc<dyn SecretsProvider>, Scope)>,
) -> Result<Vec<Arc<dyn Storage>>, ConfigError> {
    let mut candidates = registered;
    if !candidates.iter().any(|storage| storage.id() == MEMORY_STORAGE_ID) {
        candidates.insert(0, Arc::new(MemoryStorage::runtime()));
    }
    for (provider, scope) in secrets {
        if settings.is_disabled(provider.id()) {
            debug!(provider = %provider.id(), "Secrets provider disabled");
            continue;
        }
        candidates.push(Arc::new(SecretsStorage::new(provider, scope)));
    }

    let mut seen = HashSet::new();
    for storage in &candidates {
        if !seen.insert(storage.id().to_string()) {
            return Err(init_error(format!("duplicate storage id '{}'", storage.id())));
        }
    }

    let selected: Vec<Arc<dyn Storage>> = candidates
        .into_iter()
        .filter(|storage| {
            if settings.is_disabled(storage.id()) {
                debug!(storage = %storage.id(), "Storage disabled");
                return false;
            }
            if !storage.probe(settings) {
                info!(storage = %storage.id(), "Storage not available on this system");
                return false;
            }
            true
        })
        .collect();
    Ok(order_by_priority(&selected, &settings.storage_priorities, |s| s.id()))
}

fn select_formats(
    settings: &Settings,
    registered: Vec<Arc<dyn Format>>,
) -> Result<Vec<Arc<dyn Format>>, ConfigError> {
    let mut seen = HashSet::new();
    for format in &registered {
        if !seen.insert(format.id().to_string()) {
            return Err(init_error(format!("duplicate format id '{}'", format.id())));
        }
    }
    Ok(registered
        .into_iter()
        .filter(|format| !settings.is_disabled(format.id()))
        .collect())
}

/// Asks every storage for its locations, scope by scope in precedence order.
fn discover_locations(storages: &[Arc<dyn Storage>], ctx: &LoadContext<'_>) -> SearchList {
    let mut search_list = SearchList::new();
    for &scope in ctx.settings.scope_order.scopes() {
        for storage in storages {
            for location in storage.discover(scope, ctx) {
                if location.scope() != scope {
                    warn!(storage = %storage.id(), location = %location, "Discovered location outside requested scope");
                    continue;
                }
                debug!(storage = %storage.id(), location = %location, "Discovered location");
                // The list is not frozen yet.
                let _ = search_list.push(location);
            }
        }
    }
    search_list.sort(&ctx.settings.scope_order, |id| {
        storages
            .iter()
            .position(|storage| storage.id() == id)
            .unwrap_or(storages.len())
    });
    search_list
}
