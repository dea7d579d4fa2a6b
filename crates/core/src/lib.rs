//! Layered configuration resolution.
//!
//! This crate merges configuration entries from many independently changing
//! sources into one typed, hierarchical view per configuration name. Sources are
//! ordered by scope precedence; storages, formats, scheme providers, secrets
//! providers and log sinks plug in through traits.

pub mod change;
pub mod constants;
pub mod cursor;
pub mod entry;
pub mod error;
pub mod factory;
pub mod format;
pub mod key;
pub mod layer;
pub mod layered;
pub mod location;
pub mod logging;
mod mapper;
pub mod scheme;
pub mod scope;
pub mod search_list;
pub mod secrets;
pub mod settings;
pub mod storage;
mod sync;

pub use change::{SubscriptionId, UpdateListener};
pub use cursor::{ConfigCursor, ConfigTarget, CursorState, FieldCase, SetterConvention, Strictness};
pub use entry::{Entry, EntryType, EntryValue, Number};
pub use error::{ConfigError, LayerError, SecretsError};
pub use factory::{ConfigFactory, ConfigFactoryBuilder};
pub use format::{Format, FormatOptions};
pub use key::ConfigKey;
pub use layer::{Layer, LayerContents, MemoryLayer};
pub use layered::{FlushOutcome, FlushReport, LayeredConfiguration};
pub use location::Location;
pub use logging::{LogSink, NullLogSink};
pub use scheme::{Scheme, SchemeEntry, SchemeProvider};
pub use scope::{Scope, ScopeOrder, ScopeSet};
pub use search_list::SearchList;
pub use secrets::{
    SecretCallback, SecretOptions, SecretValue, SecretsLayer, SecretsProvider, SecretsStorage,
    StaticSecretsProvider, WatchHandle,
};
pub use settings::Settings;
pub use storage::{DiscoveryInfo, LoadContext, MemoryStorage, Storage};

