//! Layered configuration.
//!
//! Responsibilities:
//! - Own the layer stack of one named configuration and resolve keys across it.
//! - Apply the configuration's scheme to resolved entries and synthesize defaults.
//! - Route writes to the right layer of the requested scope, creating one on demand.
//! - Poll storages for changes before reads and rebuild changed layers.
//!
//! Does NOT handle:
//! - Discovering layers (the factory loads them when the configuration is created).
//! - Parsing or persisting serialized forms (layers and storages do that).
//!
//! Invariants:
//! - The effective value of a key is the first valid entry found scanning layers in
//!   precedence order, restricted to the requested scopes.
//! - A write never touches a scope other than the one requested; a failed write
//!   leaves the previous entry in place.
//! - A closed configuration rejects every operation with `ConfigError::Closed`.
//! - Update listeners run after the stack lock is released.

mod flush;
mod stack;


pub use flush::{FlushOutcome, FlushReport};

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Instant;

use tracing::{debug, info, warn};

use stack::LayerStack;

use crate::change::{ChangeChecker, Subscribers, SubscriptionId, UpdateListener};
use crate::cursor::ConfigCursor;
use crate::entry::{Entry, EntryValue};
use crate::error::ConfigError;
use crate::factory::FactoryContext;
use crate::key::ConfigKey;
use crate::layer::Layer;
use crate::location::Location;
use crate::scheme::Scheme;
use crate::scope::{Scope, ScopeSet};
use crate::secrets::SecretValue;
use crate::settings::Settings;
use crate::storage::Storage;
use crate::sync::{lock, read, write};

/// Configurations of one factory by name, held weakly.
pub(crate) type ConfigCache = Mutex<HashMap<String, Weak<LayeredConfiguration>>>;

/// A named configuration resolved from a stack of layers.
pub struct LayeredConfiguration {
    name: String,
    context: Arc<FactoryContext>,
    scheme: RwLock<Arc<Scheme>>,
    stack: RwLock<LayerStack>,
    checker: ChangeChecker,
    subscribers: Subscribers,
    closed: AtomicBool,
    cache: Weak<ConfigCache>,
}

impl LayeredConfiguration {
    /// A configuration without storages; layers are added with `add_layer`.
    pub fn standalone(name: &str, settings: Settings) -> Result<Arc<Self>, ConfigError> {
        let name = crate::factory::sanitize_config_name(name)?;
        let context = Arc::new(FactoryContext::standalone(settings));
        Ok(Arc::new(Self::with_context(
            name,
            context,
            Arc::new(Scheme::new()),
            Weak::new(),
        )))
    }

    pub(crate) fn with_context(
        name: String,
        context: Arc<FactoryContext>,
        scheme: Arc<Scheme>,
        cache: Weak<ConfigCache>,
    ) -> Self {
        let checker = ChangeChecker::new(
            context.settings.update_check_scopes,
            context.settings.update_check_interval,
        );
        Self {
            name,
            context,
            scheme: RwLock::new(scheme),
            stack: RwLock::new(LayerStack::default()),
            checker,
            subscribers: Subscribers::default(),
            closed: AtomicBool::new(false),
            cache,
        }
    }

    /// The sanitized configuration name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Settings of the factory that created this configuration.
    pub fn settings(&self) -> &Settings {
        &self.context.settings
    }

    /// True once `close` ran.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), ConfigError> {
        if self.is_closed() {
            return Err(ConfigError::Closed {
                what: format!("configuration '{}'", self.name),
            });
        }
        Ok(())
    }

    /// The scheme applied on reads and writes.
    pub fn scheme(&self) -> Arc<Scheme> {
        Arc::clone(&read(&self.scheme))
    }

    /// Replaces the scheme; later reads apply the new one.
    pub fn set_scheme(&self, scheme: Scheme) -> Result<(), ConfigError> {
        self.ensure_open()?;
        *write(&self.scheme) = Arc::new(scheme);
        Ok(())
    }

    /// Adds a layer; the storage named by its location is used for change detection.
    pub fn add_layer(&self, layer: Box<dyn Layer>) -> Result<(), ConfigError> {
        self.ensure_open()?;
        let storage = self.context.storage(layer.location().storage_id()).cloned();
        self.attach(layer, storage);
        Ok(())
    }

    pub(crate) fn attach(&self, layer: Box<dyn Layer>, storage: Option<Arc<dyn Storage>>) {
        debug!(config = %self.name, location = %layer.location(), "Attaching layer");
        write(&self.stack).insert(layer, storage, &self.context.settings.scope_order);
    }

    /// Number of layers in the stack.
    pub fn layer_count(&self) -> usize {
        read(&self.stack).len()
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// Resolves `key` across every scope.
    pub fn get_entry(&self, key: &str) -> Result<Option<Entry>, ConfigError> {
        self.get_entry_in(key, ScopeSet::all())
    }

    /// Resolves `key` in `scopes`, falling back to the scheme default.
    ///
    /// A missing key is `Ok(None)` unless `exception_on_missing_entry` is set.
    /// Mandatory keys without a value are reported by `missing_mandatory_keys`.
    pub fn get_entry_in(&self, key: &str, scopes: ScopeSet) -> Result<Option<Entry>, ConfigError> {
        self.ensure_open()?;
        let key = ConfigKey::parse(key)?;
        self.poll_changes();

        if let Some(entry) = self.lookup(&key, scopes) {
            return Ok(Some(entry));
        }
        let scheme = self.scheme();
        if let Some(default) = scheme.default_entry(&key) {
            return Ok(Some(default));
        }
        if self.context.settings.exception_on_missing_entry {
            return Err(ConfigError::MissingEntry {
                key: key.to_string(),
            });
        }
        Ok(None)
    }

    /// Scans the stack for the first valid entry; no defaults, no change polling.
    pub(crate) fn lookup(&self, key: &ConfigKey, scopes: ScopeSet) -> Option<Entry> {
        let scheme = self.scheme();
        let stack = read(&self.stack);
        for slot in stack.in_scopes(scopes) {
            let Some(entry) = slot.layer.entry(key) else {
                continue;
            };
            match scheme.apply(entry) {
                Ok(entry) => return Some(entry),
                Err(reason) => warn!(
                    config = %self.name,
                    key = %key,
                    location = %slot.layer.location(),
                    reason = %reason,
                    "Skipping entry that fails its scheme"
                ),
            }
        }
        None
    }

    fn get_with<T>(
        &self,
        key: &str,
        convert: impl FnOnce(&Entry) -> Result<T, ConfigError>,
    ) -> Result<Option<T>, ConfigError> {
        self.get_entry(key)?.as_ref().map(convert).transpose()
    }

    /// The entry for `key` rendered as text.
    pub fn get_string(&self, key: &str) -> Result<Option<String>, ConfigError> {
        self.get_with(key, Entry::as_string)
    }

    /// The entry for `key` as `i32`; out-of-range numbers are a conversion error.
    pub fn get_i32(&self, key: &str) -> Result<Option<i32>, ConfigError> {
        self.get_with(key, Entry::as_i32)
    }

    /// The entry for `key` as `i64`.
    pub fn get_i64(&self, key: &str) -> Result<Option<i64>, ConfigError> {
        self.get_with(key, Entry::as_i64)
    }

    /// The entry for `key` as `f64`.
    pub fn get_f64(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        self.get_with(key, Entry::as_f64)
    }

    /// The entry for `key` as a boolean.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        self.get_with(key, Entry::as_bool)
    }

    /// The entry for `key` as raw bytes.
    pub fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, ConfigError> {
        self.get_with(key, Entry::as_bytes)
    }

    /// The entry for `key` as a list of strings.
    pub fn get_list(&self, key: &str) -> Result<Option<Vec<String>>, ConfigError> {
        self.get_with(key, Entry::as_list)
    }

    /// The raw bytes of a (usually secret) entry.
    pub fn get_secret(&self, key: &str) -> Result<Option<SecretValue>, ConfigError> {
        self.get_with(key, |entry| Ok(entry.secret()))
    }

    /// True when no layer holds any entry. Scheme defaults do not count.
    pub fn is_empty(&self) -> Result<bool, ConfigError> {
        self.ensure_open()?;
        Ok(read(&self.stack).iter().all(|slot| slot.layer.is_empty()))
    }

    /// True when a write to some scope could succeed.
    pub fn is_writeable(&self) -> Result<bool, ConfigError> {
        self.ensure_open()?;
        if read(&self.stack).iter().any(|slot| slot.layer.is_writeable()) {
            return Ok(true);
        }
        if !self.context.settings.automatic_config_creation {
            return Ok(false);
        }
        let search_list = self.context.search_list();
        Ok(search_list.locations().iter().any(|location| {
            self.context
                .storage(location.storage_id())
                .is_some_and(|storage| storage.is_generally_writeable())
        }))
    }

    /// Every key held by an enumerable layer in `scopes`.
    pub fn keys(&self, scopes: ScopeSet) -> Result<BTreeSet<ConfigKey>, ConfigError> {
        self.ensure_open()?;
        self.poll_changes();
        Ok(self.collect_keys(scopes))
    }

    pub(crate) fn collect_keys(&self, scopes: ScopeSet) -> BTreeSet<ConfigKey> {
        read(&self.stack)
            .in_scopes(scopes)
            .filter_map(|slot| slot.layer.keys())
            .flatten()
            .collect()
    }

    /// The entry at `key` or its scheme default; used for navigation.
    pub(crate) fn resolve_node(&self, key: &ConfigKey, scopes: ScopeSet) -> Option<Entry> {
        self.lookup(key, scopes)
            .or_else(|| self.scheme().default_entry(key))
    }

    /// Sorted, distinct child segments directly below `prefix` (the root when `None`).
    ///
    /// Keys with a scheme default count as present.
    pub(crate) fn child_segments(&self, prefix: Option<&ConfigKey>, scopes: ScopeSet) -> Vec<String> {
        let scheme = self.scheme();
        let defaults = scheme
            .entries()
            .filter(|declared| declared.default_value().is_some())
            .map(|declared| declared.key().clone());
        let segments: BTreeSet<String> = self
            .collect_keys(scopes)
            .into_iter()
            .chain(defaults)
            .filter_map(|key| key.child_segment_under(prefix).map(str::to_string))
            .collect();
        segments.into_iter().collect()
    }

    /// Locations of the current layers, highest precedence first.
    pub fn source_locations(&self) -> Result<Vec<Location>, ConfigError> {
        self.ensure_open()?;
        Ok(read(&self.stack)
            .iter()
            .map(|slot| slot.layer.location().clone())
            .collect())
    }

    /// Mandatory scheme keys without an entry or a default.
    pub fn missing_mandatory_keys(&self) -> Result<Vec<ConfigKey>, ConfigError> {
        self.ensure_open()?;
        let scheme = self.scheme();
        Ok(scheme
            .entries()
            .filter(|declared| declared.is_mandatory() && declared.default_value().is_none())
            .filter(|declared| self.lookup(declared.key(), ScopeSet::all()).is_none())
            .map(|declared| declared.key().clone())
            .collect())
    }

    /// A cursor over the merged view of every scope, positioned at the root.
    pub fn cursor(&self) -> Result<ConfigCursor<'_>, ConfigError> {
        self.cursor_in(ScopeSet::all())
    }

    /// A cursor restricted to `scopes`.
    pub fn cursor_in(&self, scopes: ScopeSet) -> Result<ConfigCursor<'_>, ConfigError> {
        self.ensure_open()?;
        self.poll_changes();
        Ok(ConfigCursor::new(self, scopes))
    }

    // ---------------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------------

    /// Writes `value` for `key` into `scope`.
    ///
    /// Target: a writeable layer of the scope already holding the key, else the
    /// first writeable layer of the scope, else a layer created through the
    /// scope's storages. With `write_sync` the target is flushed immediately and
    /// the previous entry is restored if that fails.
    pub fn put(
        &self,
        key: &str,
        value: impl Into<EntryValue>,
        scope: Scope,
    ) -> Result<(), ConfigError> {
        self.ensure_open()?;
        let key = ConfigKey::parse(key)?;
        let scheme = self.scheme();
        let value = scheme.check_input(&key, &value.into())?;
        let settings = &self.context.settings;

        let mut stack = write(&self.stack);
        let holding = stack
            .writeable_in(scope)
            .find(|slot| slot.layer.entry(&key).is_some())
            .map(|slot| (slot.id, slot.layer.entry(&key)));
        let first = stack.writeable_in(scope).next().map(|slot| slot.id);

        let (target, created, previous_comment) = match (holding, first) {
            (Some((id, previous)), _) => (
                id,
                false,
                previous.and_then(|entry| entry.comment().map(str::to_string)),
            ),
            (None, Some(id)) => (id, false, None),
            (None, None) => (self.create_layer(&mut stack, scope)?, true, None),
        };

        let description = (settings.description_on_create && previous_comment.is_none())
            .then(|| scheme.description(&key))
            .flatten();
        let mut entry = Entry::new(key.clone(), value);
        if let Some(comment) = merge_comments(description, previous_comment.as_deref()) {
            entry = entry.with_comment(comment);
        }

        let result = match stack.get_mut(target) {
            Some(slot) => {
                slot.touch();
                write_to(slot.layer.as_mut(), entry, settings.write_sync)
            }
            None => Err(ConfigError::NoWriteableLocation { scope }),
        };
        if let Err(e) = result {
            if created {
                stack.remove(target);
            }
            warn!(config = %self.name, key = %key, scope = %scope, error = %e, "Write failed");
            return Err(e);
        }
        debug!(config = %self.name, key = %key, scope = %scope, "Entry written");
        Ok(())
    }

    fn create_layer(&self, stack: &mut LayerStack, scope: Scope) -> Result<u64, ConfigError> {
        if !self.context.settings.automatic_config_creation {
            return Err(ConfigError::NoWriteableLocation { scope });
        }
        let ctx = self.context.load_context();
        let candidates: Vec<Location> = self.context.search_list().in_scope(scope).cloned().collect();
        for location in candidates {
            let Some(storage) = self.context.storage(location.storage_id()) else {
                continue;
            };
            if !storage.is_generally_writeable() {
                continue;
            }
            match storage.create_layer(&self.name, &location, &ctx) {
                Ok(Some(layer)) => {
                    info!(config = %self.name, location = %layer.location(), "Created configuration layer");
                    return Ok(stack.insert(
                        layer,
                        Some(Arc::clone(storage)),
                        &self.context.settings.scope_order,
                    ));
                }
                Ok(None) => continue,
                Err(e) => {
                    warn!(config = %self.name, location = %location, error = %e, "Cannot create layer");
                }
            }
        }
        Err(ConfigError::NoWriteableLocation { scope })
    }

    /// Removes `key` from the writeable layers of `scope`; true if anything was removed.
    pub fn remove(&self, key: &str, scope: Scope) -> Result<bool, ConfigError> {
        self.ensure_open()?;
        let key = ConfigKey::parse(key)?;
        let write_sync = self.context.settings.write_sync;
        let mut stack = write(&self.stack);
        let mut removed_any = false;
        for slot in stack.iter_mut() {
            if slot.layer.scope() != scope || !slot.layer.is_writeable() {
                continue;
            }
            let Some(previous) = slot.layer.remove_entry(&key)? else {
                continue;
            };
            slot.touch();
            if write_sync {
                if let Err(e) = slot.layer.flush() {
                    restore(slot.layer.as_mut(), &key, Some(previous));
                    return Err(e.into());
                }
            }
            removed_any = true;
        }
        Ok(removed_any)
    }

    /// Flushes every dirty layer.
    pub fn flush(&self) -> Result<FlushReport, ConfigError> {
        self.ensure_open()?;
        Ok(self.flush_layers())
    }

    fn flush_layers(&self) -> FlushReport {
        let mut report = FlushReport::default();
        let mut stack = write(&self.stack);
        for slot in stack.iter_mut().filter(|slot| slot.layer.is_dirty()) {
            slot.touch();
            let result = slot.layer.flush();
            if let Err(e) = &result {
                warn!(config = %self.name, location = %slot.layer.location(), error = %e, "Flush failed");
            }
            report.push(slot.layer.location().clone(), result);
        }
        report
    }

    // ---------------------------------------------------------------------
    // Change detection
    // ---------------------------------------------------------------------

    /// Notifies `listener` whenever a layer of this configuration is rebuilt.
    pub fn subscribe(&self, listener: UpdateListener) -> Result<SubscriptionId, ConfigError> {
        self.ensure_open()?;
        Ok(self.subscribers.subscribe(None, listener))
    }

    /// Notifies `listener` when a rebuilt layer changes the entry for `key`.
    pub fn subscribe_key(
        &self,
        key: &str,
        listener: UpdateListener,
    ) -> Result<SubscriptionId, ConfigError> {
        self.ensure_open()?;
        let key = ConfigKey::parse(key)?;
        Ok(self.subscribers.subscribe(Some(key), listener))
    }

    /// Removes a listener; false when `id` is unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Checks every layer for changes regardless of scope and interval.
    ///
    /// Returns how many layers were rebuilt.
    pub fn reload(&self) -> Result<usize, ConfigError> {
        self.ensure_open()?;
        Ok(self.rebuild_changed(true))
    }

    fn poll_changes(&self) {
        if self.checker.is_due(Instant::now()) {
            self.rebuild_changed(false);
        }
    }

    fn rebuild_changed(&self, force: bool) -> usize {
        let changed: Vec<(u64, u64, Location, Arc<dyn Storage>)> = read(&self.stack)
            .iter()
            .filter(|slot| force || self.checker.watches(slot.layer.scope()))
            .filter_map(|slot| {
                let storage = slot.storage.as_ref()?;
                let location = slot.layer.location();
                if force {
                    storage.trigger_change_check(location);
                }
                storage
                    .has_changed(location)
                    .then(|| (slot.id, slot.generation, location.clone(), Arc::clone(storage)))
            })
            .collect();
        if changed.is_empty() {
            return 0;
        }

        let ctx = self.context.load_context();
        let mut rebuilt = Vec::new();
        for (id, generation, location, storage) in changed {
            match storage.reload_layer(&self.name, &location, &ctx) {
                Ok(layer) => rebuilt.push((id, generation, layer, storage)),
                Err(e) => warn!(
                    config = %self.name,
                    location = %location,
                    error = %e,
                    "Reload failed; keeping last known good layer"
                ),
            }
        }

        let watched = self.subscribers.watched_keys();
        let mut notifications = Vec::new();
        {
            let mut stack = write(&self.stack);
            for (id, generation, layer, storage) in rebuilt {
                let Some(slot) = stack.get_mut(id) else {
                    continue;
                };
                if slot.generation != generation {
                    // Written while the reload ran; the rebuilt layer predates that write.
                    debug!(config = %self.name, location = %slot.layer.location(), "Layer written during reload; rebuilt layer discarded");
                    storage.trigger_change_check(slot.layer.location());
                    continue;
                }
                if slot.layer.is_dirty() {
                    warn!(config = %self.name, location = %slot.layer.location(), "Layer has unflushed changes; reload skipped");
                    continue;
                }
                let changed_keys: Vec<ConfigKey> = watched
                    .iter()
                    .filter(|key| !same_entry(slot.layer.entry(key), layer.entry(key)))
                    .cloned()
                    .collect();
                let location = layer.location().clone();
                slot.layer = layer;
                notifications.push((location, changed_keys));
            }
        }

        let count = notifications.len();
        for (location, changed_keys) in notifications {
            info!(config = %self.name, location = %location, "Layer reloaded");
            for listener in self.subscribers.listeners_for(&changed_keys) {
                listener(&location);
            }
        }
        count
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Flushes pending writes and closes the configuration. Idempotent.
    pub fn close(&self) -> FlushReport {
        if self.closed.swap(true, Ordering::SeqCst) {
            return FlushReport::default();
        }
        let report = self.flush_layers();
        self.subscribers.clear();
        write(&self.stack).clear();
        self.evict();
        info!(config = %self.name, "Configuration closed");
        report
    }

    fn evict(&self) {
        let Some(cache) = self.cache.upgrade() else {
            return;
        };
        let mut cache = lock(&cache);
        let is_self = cache
            .get(&self.name)
            .is_some_and(|cached| std::ptr::eq(cached.as_ptr(), self));
        if is_self {
            cache.remove(&self.name);
        }
    }
}

fn write_to(layer: &mut dyn Layer, entry: Entry, write_sync: bool) -> Result<(), ConfigError> {
    let key = entry.key().clone();
    let previous = layer.write_entry(entry)?;
    if write_sync {
        if let Err(e) = layer.flush() {
            restore(layer, &key, previous);
            return Err(e.into());
        }
    }
    Ok(())
}

/// Puts `previous` back (or removes `key` when there was none) after a failed flush.
fn restore(layer: &mut dyn Layer, key: &ConfigKey, previous: Option<Entry>) {
    let result = match previous {
        Some(previous) => layer.write_entry(previous).map(|_| ()),
        None => layer.remove_entry(key).map(|_| ()),
    };
    if let Err(e) = result {
        warn!(location = %layer.location(), key = %key, error = %e, "Rollback after failed flush failed");
    }
}

fn same_entry(a: Option<Entry>, b: Option<Entry>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.same_value(&b),
        _ => false,
    }
}

/// Description lines first, then existing comment lines not already present.
fn merge_comments(description: Option<&str>, existing: Option<&str>) -> Option<String> {
    let mut lines: Vec<&str> = Vec::new();
    for line in description.into_iter().chain(existing).flat_map(str::lines) {
        if !lines.contains(&line) {
            lines.push(line);
        }
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}

impl fmt::Debug for LayeredConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayeredConfiguration")
            .field("name", &self.name)
            .field("layers", &self.layer_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}
