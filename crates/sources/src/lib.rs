//! Concrete collaborators for layerconf.
//!
//! This crate provides the filesystem storage and its JSON/TOML formats, the
//! environment-variable storage, a keyring secrets provider, a scheme provider
//! reading `*.scheme.json` files and a `tracing-subscriber` log sink.

pub mod dirs;
pub mod env;
mod error;
pub mod file;
pub mod format;
pub mod logging;
pub mod scheme;
pub mod secrets;

pub use env::{EnvVarStorage, load_dotenv};
pub use error::DotenvError;
pub use file::{FileLayer, FileStorage};
pub use format::{JsonFormat, TomlFormat};
pub use logging::FmtLogSink;
pub use scheme::JsonSchemeProvider;
pub use secrets::KeyringSecretsProvider;

use std::sync::Arc;

use layerconf::ConfigFactoryBuilder;

/// Registers the file and environment storages, both formats and the fmt log sink.
pub fn with_defaults(builder: ConfigFactoryBuilder) -> ConfigFactoryBuilder {
    builder
        .with_storage(Arc::new(FileStorage::new()))
        .with_storage(Arc::new(EnvVarStorage::new()))
        .with_format(Arc::new(JsonFormat))
        .with_format(Arc::new(TomlFormat))
        .with_log_sink(Arc::new(FmtLogSink::new()))
}
