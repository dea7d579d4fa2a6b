//! Environment variable overrides for factory settings.
//!
//! Responsibilities:
//! - Read the `LAYERCONF_*` variables and apply them to `Settings`.
//! - Provide the trimming helper used for every variable read.
//!
//! Does NOT handle:
//! - Environment variables as a configuration source (see the env storage in
//!   `layerconf-sources`).
//! - `.env` file loading.
//!
//! Invariants:
//! - Empty or whitespace-only variables are treated as unset.
//! - Returned values are trimmed.
//! - Invalid values return `ConfigError::InvalidSetting` naming the variable.

use crate::constants::{
    ENV_DISABLED_MODULES, ENV_EXCEPTION_ON_MISSING_ENTRY, ENV_LOG_LEVEL, ENV_TEST_MODE,
    ENV_WRITE_SYNC, MAX_LOG_LEVEL,
};
use crate::entry::parse_bool;
use crate::error::ConfigError;
use crate::settings::Settings;

/// Read an environment variable, returning None if unset, empty, or whitespace-only.
/// Returns the trimmed value if present.
pub fn env_var_or_none(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == s.len() {
            Some(s)
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_flag(var: &str) -> Result<Option<bool>, ConfigError> {
    env_var_or_none(var)
        .map(|raw| {
            parse_bool(&raw).ok_or_else(|| ConfigError::InvalidSetting {
                var: var.to_string(),
                message: "must be true or false".to_string(),
            })
        })
        .transpose()
}

/// Apply environment variable overrides to `settings`.
pub fn apply_env(settings: &mut Settings) -> Result<(), ConfigError> {
    if let Some(level) = env_var_or_none(ENV_LOG_LEVEL) {
        let level: u8 = level
            .parse()
            .ok()
            .filter(|level| *level <= MAX_LOG_LEVEL)
            .ok_or_else(|| ConfigError::InvalidSetting {
                var: ENV_LOG_LEVEL.to_string(),
                message: format!("must be a number between 0 and {MAX_LOG_LEVEL}"),
            })?;
        settings.log_level = level;
    }
    if let Some(test_mode) = env_flag(ENV_TEST_MODE)? {
        settings.test_mode = test_mode;
    }
    if let Some(modules) = env_var_or_none(ENV_DISABLED_MODULES) {
        settings.disabled_module_ids.extend(
            modules
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        );
    }
    if let Some(write_sync) = env_flag(ENV_WRITE_SYNC)? {
        settings.write_sync = write_sync;
    }
    if let Some(exception) = env_flag(ENV_EXCEPTION_ON_MISSING_ENTRY)? {
        settings.exception_on_missing_entry = exception;
    }
    Ok(())
}
