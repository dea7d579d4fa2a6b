//! Secrets providers and the secrets layer.
//!
//! Responsibilities:
//! - Define the `SecretsProvider` collaborator contract and `WatchHandle`.
//! - Expose a provider as a read-only layer (`SecretsLayer`) through `SecretsStorage`.
//! - Provide `StaticSecretsProvider`, a map-backed provider for tests and embedding.
//!
//! Does NOT handle:
//! - Any cryptography; providers return plaintext bytes wrapped in `SecretValue`.
//!
//! Invariants:
//! - Entries produced from secrets are always sealed; their plain accessors fail.
//! - A secrets layer is never writeable.
//! - A cancelled `WatchHandle` never fires again; dropping a handle cancels it.

mod layer;
mod static_provider;
mod value;

pub use layer::{SecretsLayer, SecretsStorage};
pub use static_provider::StaticSecretsProvider;
pub use value::SecretValue;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::SecretsError;

/// Invoked with the provider path of a secret that changed.
pub type SecretCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Per-request options for `SecretsProvider::get_secret`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretOptions {
    /// Provider-specific version selector; `None` means latest.
    pub version: Option<String>,
}

/// A backend holding secret values addressed by `/`-separated paths.
pub trait SecretsProvider: Send + Sync {
    fn id(&self) -> &str;

    /// The secret at `path`, or `Ok(None)` when none exists.
    fn get_secret(
        &self,
        path: &str,
        options: &SecretOptions,
    ) -> Result<Option<SecretValue>, SecretsError>;

    /// Paths starting with `prefix`.
    fn list_secrets(&self, _prefix: &str) -> Result<Vec<String>, SecretsError> {
        Err(SecretsError::Unsupported {
            provider: self.id().to_string(),
            operation: "list",
        })
    }

    fn watch_secret(
        &self,
        _path: &str,
        _callback: SecretCallback,
    ) -> Result<WatchHandle, SecretsError> {
        Err(SecretsError::Unsupported {
            provider: self.id().to_string(),
            operation: "watch",
        })
    }

    fn renew_auth(&self) -> Result<(), SecretsError> {
        Ok(())
    }
}

/// Cancels a secret watch when cancelled explicitly or dropped.
pub struct WatchHandle {
    cancelled: Arc<AtomicBool>,
}

impl WatchHandle {
    /// A handle whose flag the provider checks before firing.
    pub fn new(cancelled: Arc<AtomicBool>) -> Self {
        Self { cancelled }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
