//! Settings that control a configuration factory.
//!
//! Responsibilities:
//! - Hold the typed, defaulted settings evaluated once when a factory is built.
//! - Map the numeric verbosity to a `tracing` level filter.
//!
//! Does NOT handle:
//! - Reading settings from the environment (see `factory::env`).
//!
//! Invariants:
//! - Settings are immutable once the factory is built.
//! - `log_level` is within `0..=MAX_LOG_LEVEL`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use tracing::level_filters::LevelFilter;

use crate::constants::{DEFAULT_LOG_LEVEL, MAX_LOG_LEVEL};
use crate::scope::{Scope, ScopeOrder, ScopeSet};

#[derive(Debug, Clone)]
pub struct Settings {
    pub company_name: String,
    pub application_name: String,
    /// Appended to every directory a storage derives.
    pub sub_path: Option<PathBuf>,
    pub test_mode: bool,
    /// In test mode these replace the default directories of their scope.
    pub test_mode_directories: BTreeMap<Scope, Vec<PathBuf>>,
    pub additional_directories: BTreeMap<Scope, Vec<PathBuf>>,
    pub no_default_directories: bool,
    pub automatic_config_creation: bool,
    pub write_sync: bool,
    pub exception_on_missing_entry: bool,
    pub exception_when_configuration_not_found: bool,
    /// Format ids in reading order; unlisted formats follow in registration order.
    pub format_reading_priorities: Vec<String>,
    pub format_writing_priorities: Vec<String>,
    pub storage_priorities: Vec<String>,
    pub disabled_module_ids: Vec<String>,
    pub comments_reading: bool,
    pub comments_writing: bool,
    pub description_on_create: bool,
    pub log_level: u8,
    pub write_condensed_format: bool,
    pub update_check_scopes: ScopeSet,
    pub update_check_interval: Duration,
    pub scope_order: ScopeOrder,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            company_name: String::new(),
            application_name: String::new(),
            sub_path: None,
            test_mode: false,
            test_mode_directories: BTreeMap::new(),
            additional_directories: BTreeMap::new(),
            no_default_directories: false,
            automatic_config_creation: true,
            write_sync: true,
            exception_on_missing_entry: false,
            exception_when_configuration_not_found: false,
            format_reading_priorities: Vec::new(),
            format_writing_priorities: Vec::new(),
            storage_priorities: Vec::new(),
            disabled_module_ids: Vec::new(),
            comments_reading: false,
            comments_writing: false,
            description_on_create: false,
            log_level: DEFAULT_LOG_LEVEL,
            write_condensed_format: false,
            update_check_scopes: ScopeSet::persistent(),
            update_check_interval: Duration::ZERO,
            scope_order: ScopeOrder::default(),
        }
    }
}

impl Settings {
    pub fn new(company_name: impl Into<String>, application_name: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            application_name: application_name.into(),
            ..Self::default()
        }
    }

    pub fn is_disabled(&self, module_id: &str) -> bool {
        self.disabled_module_ids
            .iter()
            .any(|disabled| disabled.eq_ignore_ascii_case(module_id))
    }

    pub fn level_filter(&self) -> LevelFilter {
        match self.log_level.min(MAX_LOG_LEVEL) {
            0 => LevelFilter::OFF,
            1 => LevelFilter::ERROR,
            2 => LevelFilter::WARN,
            3 => LevelFilter::INFO,
            4 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    /// Directories configured for `scope`: test-mode directories in test mode,
    /// followed by additional directories.
    pub fn extra_directories(&self, scope: Scope) -> Vec<PathBuf> {
        let mut directories = Vec::new();
        if self.test_mode {
            directories.extend(self.test_mode_directories.get(&scope).into_iter().flatten().cloned());
        }
        directories.extend(
            self.additional_directories
                .get(&scope)
                .into_iter()
                .flatten()
                .cloned(),
        );
        directories
    }

    /// True when default directories apply to `scope`.
    pub fn uses_default_directories(&self, scope: Scope) -> bool {
        if self.no_default_directories {
            return false;
        }
        !(self.test_mode && self.test_mode_directories.contains_key(&scope))
    }
}
