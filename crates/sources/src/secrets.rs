//! Keyring-backed secrets provider.
//!
//! Responsibilities:
//! - Resolve secret paths as accounts of one keyring service.
//! - Store and delete secrets for callers that manage credentials.
//!
//! Does NOT handle:
//! - Listing or watching; the platform keyrings offer neither.
//!
//! Invariants:
//! - A missing keyring entry is `Ok(None)`, never an error.
//! - Error messages name the provider and the failure, never the secret.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use layerconf::{SecretOptions, SecretValue, SecretsError, SecretsProvider};

/// Default id of the keyring provider.
pub const KEYRING_PROVIDER_ID: &str = "keyring";

pub struct KeyringSecretsProvider {
    id: String,
    service: String,
}

impl KeyringSecretsProvider {
    /// Secrets stored under `service`; a secret path is the keyring account.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            id: KEYRING_PROVIDER_ID.to_string(),
            service: service.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, path: &str) -> Result<keyring::Entry, SecretsError> {
        keyring::Entry::new(&self.service, path).map_err(|e| self.backend_error(&e))
    }

    fn backend_error(&self, error: &keyring::Error) -> SecretsError {
        SecretsError::Backend {
            provider: self.id.clone(),
            message: error.to_string(),
        }
    }

    /// Stores `secret` at `path`, replacing any previous value.
    pub fn set_secret(&self, path: &str, secret: &SecretString) -> Result<(), SecretsError> {
        self.entry(path)?
            .set_password(secret.expose_secret())
            .map_err(|e| self.backend_error(&e))?;
        debug!(provider = %self.id, path, "Stored secret in keyring");
        Ok(())
    }

    /// Deletes the secret at `path`; returns false when none existed.
    pub fn delete_secret(&self, path: &str) -> Result<bool, SecretsError> {
        match self.entry(path)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(self.backend_error(&e)),
        }
    }
}

impl SecretsProvider for KeyringSecretsProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn get_secret(
        &self,
        path: &str,
        _options: &SecretOptions,
    ) -> Result<Option<SecretValue>, SecretsError> {
        match self.entry(path)?.get_password() {
            Ok(password) => Ok(Some(
                SecretValue::from_text(password).with_metadata("service", self.service.as_str()),
            )),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(self.backend_error(&e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_entry_is_none() {
        let provider = KeyringSecretsProvider::new("layerconf-test-missing");
        let secret = provider
            .get_secret("db/password-that-does-not-exist", &SecretOptions::default())
            .unwrap();
        assert!(secret.is_none());
    }

    #[test]
    fn test_with_id_renames_provider() {
        let provider = KeyringSecretsProvider::new("svc").with_id("vault");
        assert_eq!(provider.id(), "vault");
        assert_eq!(provider.service(), "svc");
    }
}
