//! Error types for configuration resolution.
//!
//! Responsibilities:
//! - Define the `ConfigError` surface returned by factories, configurations and cursors.
//! - Define `LayerError` for failures local to a single layer or storage.
//! - Define `SecretsError` for failures reported by secrets providers.
//!
//! Does NOT handle:
//! - Logging of degraded reads (callers log with `tracing::warn!` and continue).
//! - Aggregation of flush outcomes (see `layered::FlushReport`).
//!
//! Invariants:
//! - Every variant carries enough context to identify the key, scope or location involved.
//! - `LayerError` parse variants NEVER include raw source content, only positions and messages
//!   produced by the parser, so secret values cannot leak through error chains.
//! - `Closed` is terminal: once returned for an object it is returned for every later call.

use std::io::ErrorKind;

use thiserror::Error;

use crate::entry::EntryType;
use crate::scope::Scope;

/// Errors returned by the configuration engine.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Malformed builder input; the factory could not be constructed.
    #[error("Failed to build configuration factory: {reason}")]
    FactoryInit { reason: String },

    /// The factory or configuration has been closed.
    #[error("{what} is closed")]
    Closed { what: String },

    #[error("Invalid configuration key '{key}': {message}")]
    InvalidKey { key: String, message: String },

    #[error("Invalid configuration name '{0}'")]
    InvalidConfigName(String),

    #[error("Unknown scope '{0}'")]
    InvalidScope(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidSetting { var: String, message: String },

    #[error("Layer at {location} is not writeable")]
    NotWriteable { location: String },

    #[error("No writeable location available in scope {scope}")]
    NoWriteableLocation { scope: Scope },

    #[error("Missing configuration entry: {key}")]
    MissingEntry { key: String },

    #[error("Configuration '{name}' was not found in any location")]
    NoConfigurationFound { name: String },

    /// A value was rejected by the scheme before it reached any layer.
    #[error("Invalid value for {key}: {message}")]
    InputInvalid { key: String, message: String },

    #[error("Invalid use: {0}")]
    InvalidUse(String),

    /// A plain accessor was called on a secret entry.
    #[error("Entry {key} is secret; use the secret accessor")]
    SecretRedacted { key: String },

    #[error("Cannot convert {key} from {found} to {expected}")]
    Conversion {
        key: String,
        expected: &'static str,
        found: EntryType,
    },

    #[error("Invalid scheme: {0}")]
    InvalidScheme(String),

    #[error("{failed} of {total} layers failed to flush")]
    Flush { failed: usize, total: usize },

    #[error(transparent)]
    Layer(#[from] LayerError),

    #[error(transparent)]
    Secrets(#[from] SecretsError),

    #[error("Failed to map configuration onto target type: {0}")]
    Deserialize(#[from] serde_json::Error),
}

impl ConfigError {
    /// True for errors that stay true for the lifetime of the object that raised them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConfigError::Closed { .. })
    }

    /// True for errors that only concern a single value conversion.
    pub fn is_conversion(&self) -> bool {
        matches!(self, ConfigError::Conversion { .. })
    }
}

/// Errors local to a single layer, format or storage.
#[derive(Error, Debug)]
pub enum LayerError {
    #[error("Failed to read {location}")]
    Read {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// SAFETY: `message` comes from the parser and never echoes the offending content.
    #[error("Failed to parse {location}: {message}")]
    Parse { location: String, message: String },

    #[error("Failed to write {location}")]
    Write {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode {location}: {message}")]
    Encode { location: String, message: String },

    #[error("Layer at {location} is not writeable")]
    NotWriteable { location: String },

    #[error("{operation} is not supported by storage '{storage}'")]
    Unsupported {
        storage: String,
        operation: &'static str,
    },

    #[error("Invalid location: {0}")]
    InvalidLocation(String),
}

impl LayerError {
    /// The I/O error kind behind this error, if any.
    pub fn io_kind(&self) -> Option<ErrorKind> {
        match self {
            LayerError::Read { source, .. } | LayerError::Write { source, .. } => {
                Some(source.kind())
            }
            _ => None,
        }
    }
}

/// Errors reported by secrets providers.
#[derive(Error, Debug)]
pub enum SecretsError {
    #[error("Secret not found: {path}")]
    NotFound { path: String },

    #[error("{operation} is not supported by secrets provider '{provider}'")]
    Unsupported {
        provider: String,
        operation: &'static str,
    },

    #[error("Authentication with secrets provider '{provider}' expired")]
    AuthExpired { provider: String },

    #[error("Secrets provider '{provider}' failed: {message}")]
    Backend { provider: String, message: String },
}
