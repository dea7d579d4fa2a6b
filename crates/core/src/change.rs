//! Change detection and update subscriptions.
//!
//! Responsibilities:
//! - Decide when a configuration polls its storages (`ChangeChecker`), honouring
//!   the watched scope set and the minimum interval between checks.
//! - Keep the listeners subscribed to a configuration (`Subscribers`).
//!
//! Does NOT handle:
//! - Rebuilding layers (see `layered`); storages answer `has_changed` themselves.
//!
//! Invariants:
//! - Listeners are invoked with no lock held; a listener may call back into the
//!   configuration that notified it.
//! - An interval of zero checks on every read.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::key::ConfigKey;
use crate::location::Location;
use crate::scope::{Scope, ScopeSet};
use crate::sync::lock;

/// Receives the location of a layer that was rebuilt.
pub type UpdateListener = Arc<dyn Fn(&Location) + Send + Sync>;

/// Identifies a subscription for `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub(crate) struct ChangeChecker {
    scopes: ScopeSet,
    interval: Duration,
    last_check: Mutex<Option<Instant>>,
}

impl ChangeChecker {
    pub(crate) fn new(scopes: ScopeSet, interval: Duration) -> Self {
        Self {
            scopes,
            interval,
            last_check: Mutex::new(None),
        }
    }

    pub(crate) fn watches(&self, scope: Scope) -> bool {
        self.scopes.has(scope)
    }

    /// True when a check is due at `now`; records the check if so.
    pub(crate) fn is_due(&self, now: Instant) -> bool {
        if self.scopes.is_empty() {
            return false;
        }
        let mut last = lock(&self.last_check);
        let due = match *last {
            Some(previous) => now.saturating_duration_since(previous) >= self.interval,
            None => true,
        };
        if due {
            *last = Some(now);
        }
        due
    }
}

struct Subscription {
    id: SubscriptionId,
    key: Option<ConfigKey>,
    listener: UpdateListener,
}

#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: AtomicU64,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&self, key: Option<ConfigKey>, listener: UpdateListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.subscriptions).push(Subscription { id, key, listener });
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = lock(&self.subscriptions);
        let before = subscriptions.len();
        subscriptions.retain(|subscription| subscription.id != id);
        subscriptions.len() != before
    }

    /// Keys some listener is interested in.
    pub(crate) fn watched_keys(&self) -> Vec<ConfigKey> {
        lock(&self.subscriptions)
            .iter()
            .filter_map(|subscription| subscription.key.clone())
            .collect()
    }

    /// Listeners to notify for a rebuilt layer whose changed keys are `changed`.
    pub(crate) fn listeners_for(&self, changed: &[ConfigKey]) -> Vec<UpdateListener> {
        lock(&self.subscriptions)
            .iter()
            .filter(|subscription| match &subscription.key {
                None => true,
                Some(key) => changed.contains(key),
            })
            .map(|subscription| Arc::clone(&subscription.listener))
            .collect()
    }

    pub(crate) fn clear(&self) {
        lock(&self.subscriptions).clear();
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.subscriptions).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_checks_every_time() {
        let checker = ChangeChecker::new(ScopeSet::persistent(), Duration::ZERO);
        let now = Instant::now();
        assert!(checker.is_due(now));
        assert!(checker.is_due(now));
    }

    #[test]
    fn test_interval_throttles_checks() {
        let checker = ChangeChecker::new(ScopeSet::persistent(), Duration::from_secs(60));
        let start = Instant::now();
        assert!(checker.is_due(start));
        assert!(!checker.is_due(start + Duration::from_secs(30)));
        assert!(checker.is_due(start + Duration::from_secs(61)));
    }

    #[test]
    fn test_empty_scope_set_never_checks() {
        let checker = ChangeChecker::new(ScopeSet::empty(), Duration::ZERO);
        assert!(!checker.is_due(Instant::now()));
        assert!(!checker.watches(Scope::User));
    }

    #[test]
    fn test_key_subscriptions_filter_notifications() {
        let subscribers = Subscribers::default();
        let all = subscribers.subscribe(None, Arc::new(|_: &Location| {}));
        let keyed = subscribers.subscribe(
            Some(ConfigKey::parse("a").unwrap()),
            Arc::new(|_: &Location| {}),
        );

        assert_eq!(subscribers.listeners_for(&[]).len(), 1);
        assert_eq!(
            subscribers
                .listeners_for(&[ConfigKey::parse("a").unwrap()])
                .len(),
            2
        );
        assert_eq!(subscribers.watched_keys().len(), 1);

        assert!(subscribers.unsubscribe(keyed));
        assert!(!subscribers.unsubscribe(keyed));
        assert!(subscribers.unsubscribe(all));
        assert_eq!(subscribers.len(), 0);
    }
}
