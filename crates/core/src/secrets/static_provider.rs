//! Map-backed secrets provider.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::{SecretCallback, SecretOptions, SecretValue, SecretsProvider, WatchHandle};
use crate::error::SecretsError;
use crate::sync::lock;

struct Watch {
    path: String,
    cancelled: Arc<AtomicBool>,
    callback: SecretCallback,
}

/// Secrets held in process memory. Watches fire on `set` and `remove`.
pub struct StaticSecretsProvider {
    id: String,
    secrets: Mutex<BTreeMap<String, SecretValue>>,
    watches: Mutex<Vec<Watch>>,
}

impl StaticSecretsProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secrets: Mutex::new(BTreeMap::new()),
            watches: Mutex::new(Vec::new()),
        }
    }

    pub fn with_secret(self, path: &str, secret: SecretValue) -> Self {
        lock(&self.secrets).insert(path.to_string(), secret);
        self
    }

    pub fn set(&self, path: &str, secret: SecretValue) {
        lock(&self.secrets).insert(path.to_string(), secret);
        self.notify(path);
    }

    pub fn remove(&self, path: &str) -> bool {
        let removed = lock(&self.secrets).remove(path).is_some();
        if removed {
            self.notify(path);
        }
        removed
    }

    fn notify(&self, path: &str) {
        let callbacks: Vec<SecretCallback> = {
            let mut watches = lock(&self.watches);
            watches.retain(|watch| !watch.cancelled.load(Ordering::SeqCst));
            watches
                .iter()
                .filter(|watch| watch.path == path)
                .map(|watch| Arc::clone(&watch.callback))
                .collect()
        };
        debug!(provider = %self.id, path, watchers = callbacks.len(), "Secret changed");
        for callback in callbacks {
            callback(path);
        }
    }
}

impl SecretsProvider for StaticSecretsProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn get_secret(
        &self,
        path: &str,
        _options: &SecretOptions,
    ) -> Result<Option<SecretValue>, SecretsError> {
        Ok(lock(&self.secrets).get(path).cloned())
    }

    fn list_secrets(&self, prefix: &str) -> Result<Vec<String>, SecretsError> {
        Ok(lock(&self.secrets)
            .keys()
            .filter(|path| path.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn watch_secret(
        &self,
        path: &str,
        callback: SecretCallback,
    ) -> Result<WatchHandle, SecretsError> {
        let cancelled = Arc::new(AtomicBool::new(false));
        lock(&self.watches).push(Watch {
            path: path.to_string(),
            cancelled: Arc::clone(&cancelled),
            callback,
        });
        Ok(WatchHandle::new(cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_watch_fires_until_cancelled() {
        let provider = StaticSecretsProvider::new("static");
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let handle = provider
            .watch_secret(
                "app/token",
                Arc::new(move |_: &str| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        provider.set("app/token", SecretValue::from_text("one"));
        provider.set("app/other", SecretValue::from_text("x"));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        handle.cancel();
        assert!(handle.is_cancelled());
        provider.set("app/token", SecretValue::from_text("two"));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropping_handle_cancels_watch() {
        let provider = StaticSecretsProvider::new("static");
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        drop(
            provider
                .watch_secret(
                    "p",
                    Arc::new(move |_: &str| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
                )
                .unwrap(),
        );
        provider.set("p", SecretValue::from_text("v"));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_list_and_remove() {
        let provider = StaticSecretsProvider::new("static")
            .with_secret("app/a", SecretValue::from_text("1"))
            .with_secret("app/b", SecretValue::from_text("2"))
            .with_secret("other/c", SecretValue::from_text("3"));

        assert_eq!(provider.list_secrets("app/").unwrap(), vec!["app/a", "app/b"]);
        assert!(provider.remove("app/a"));
        assert!(!provider.remove("app/a"));
        assert!(
            provider
                .get_secret("app/a", &SecretOptions::default())
                .unwrap()
                .is_none()
        );
    }
}
