//! Centralized constants for the layerconf workspace.
//!
//! This module contains default values used across crates to avoid
//! magic string and number duplication.

// =============================================================================
// Keys & Redaction
// =============================================================================

/// Separator between the segments of a hierarchical configuration key.
pub const KEY_SEPARATOR: char = '/';

/// Fixed marker rendered in place of secret values.
pub const REDACTED_MARKER: &str = "[REDACTED]";

// =============================================================================
// Settings Defaults
// =============================================================================

/// Default numeric verbosity (0 = off, 5 = trace).
pub const DEFAULT_LOG_LEVEL: u8 = 2;

/// Highest accepted numeric verbosity.
pub const MAX_LOG_LEVEL: u8 = 5;

// =============================================================================
// Environment Variable Names
// =============================================================================

/// Numeric verbosity override for the factory builder.
pub const ENV_LOG_LEVEL: &str = "LAYERCONF_LOG_LEVEL";

/// Enables test mode (test directories replace the defaults).
pub const ENV_TEST_MODE: &str = "LAYERCONF_TEST_MODE";

/// Comma separated list of module ids to disable.
pub const ENV_DISABLED_MODULES: &str = "LAYERCONF_DISABLED_MODULES";

/// Overrides whether writes are flushed immediately.
pub const ENV_WRITE_SYNC: &str = "LAYERCONF_WRITE_SYNC";

/// Overrides whether a missing entry is an error.
pub const ENV_EXCEPTION_ON_MISSING_ENTRY: &str = "LAYERCONF_EXCEPTION_ON_MISSING_ENTRY";

// =============================================================================
// Built-in Module Ids
// =============================================================================

/// Id of the built-in in-memory storage serving the runtime scope.
pub const MEMORY_STORAGE_ID: &str = "memory";

/// Id of the always-available log sink that installs nothing.
pub const NULL_LOG_SINK_ID: &str = "null";
