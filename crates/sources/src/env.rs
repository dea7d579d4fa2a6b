//! Environment-variable storage.
//!
//! Responsibilities:
//! - Expose `<APPLICATION>_<CONFIG>_<KEY>` variables as a read-only session-scope layer.
//! - Load a `.env` file into the process environment on request (`load_dotenv`).
//!
//! Does NOT handle:
//! - Typing values; entries are text and a scheme retypes them on resolution.
//!
//! Invariants:
//! - Names are uppercased; `/` in a key maps to `_` and a literal `_` to `__`.
//! - Empty or whitespace-only variables are treated as unset.
//! - The `DOTENV_DISABLED` variable is checked before `dotenvy::dotenv()` is called.
//! - Dotenv errors never include raw .env line contents.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use layerconf::{
    ConfigKey, DiscoveryInfo, Entry, Layer, LayerContents, LayerError, LoadContext, Location,
    MemoryLayer, Scope, Storage,
};

use crate::error::DotenvError;

/// Default id of the environment storage.
pub const ENV_STORAGE_ID: &str = "env";

/// Check if dotenv loading is disabled via environment variable.
fn dotenv_disabled() -> bool {
    matches!(
        std::env::var("DOTENV_DISABLED").ok().as_deref(),
        Some("true") | Some("1")
    )
}

/// Load environment variables from .env file if present.
///
/// Returns whether a file was loaded. Missing `.env` files are silently ignored.
///
/// # Errors
///
/// - The `.env` file exists but has invalid syntax (`DotenvError::Parse`)
/// - The `.env` file exists but cannot be read due to I/O errors (`DotenvError::Io`)
pub fn load_dotenv() -> Result<bool, DotenvError> {
    if dotenv_disabled() {
        return Ok(false);
    }
    match dotenvy::dotenv() {
        Ok(path) => {
            debug!(path = %path.display(), "Loaded .env file");
            Ok(true)
        }
        Err(e) if is_not_found(&e) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Check if a dotenv error indicates the file was not found.
fn is_not_found(err: &dotenvy::Error) -> bool {
    matches!(
        err,
        dotenvy::Error::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound
    )
}

/// Encodes one name for use inside a variable name.
fn encode_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for c in segment.chars() {
        if c.is_ascii_alphanumeric() {
            encoded.push(c.to_ascii_uppercase());
        } else {
            encoded.push_str("__");
        }
    }
    encoded
}

/// The variable name holding `key` of configuration `config` for `application`.
pub fn variable_name(application: &str, config: &str, key: &ConfigKey) -> String {
    let key = key
        .segments()
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("_");
    format!(
        "{}_{}_{key}",
        encode_segment(application),
        encode_segment(config)
    )
}

/// Splits an encoded name at the first single `_`, decoding `__` to `_`.
fn split_segment(encoded: &str) -> (String, Option<&str>) {
    let mut decoded = String::new();
    let mut chars = encoded.char_indices().peekable();
    while let Some((index, c)) = chars.next() {
        if c != '_' {
            decoded.push(c.to_ascii_lowercase());
            continue;
        }
        if chars.peek().is_some_and(|(_, next)| *next == '_') {
            chars.next();
            decoded.push('_');
        } else {
            return (decoded, Some(&encoded[index + 1..]));
        }
    }
    (decoded, None)
}

/// Decodes the key part of a variable name, e.g. `NET_MAX__CONN` to `net/max_conn`.
fn decode_key(mut encoded: &str) -> Option<ConfigKey> {
    let mut segments = Vec::new();
    loop {
        let (segment, rest) = split_segment(encoded);
        segments.push(segment);
        match rest {
            Some(rest) => encoded = rest,
            None => break,
        }
    }
    ConfigKey::parse(&segments.join("/")).ok()
}

enum Source {
    Process,
    Injected(Mutex<BTreeMap<String, String>>),
}

/// Variables seen when a layer was last built.
struct Observation {
    prefix: String,
    variables: BTreeMap<String, String>,
}

/// Session-scope storage over environment variables.
pub struct EnvVarStorage {
    id: String,
    source: Source,
    observed: Mutex<HashMap<String, Observation>>,
}

impl EnvVarStorage {
    /// Reads the process environment.
    pub fn new() -> Self {
        Self {
            id: ENV_STORAGE_ID.to_string(),
            source: Source::Process,
            observed: Mutex::new(HashMap::new()),
        }
    }

    /// Reads `variables` instead of the process environment.
    pub fn with_variables<I, K, V>(variables: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let variables = variables
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        Self {
            source: Source::Injected(Mutex::new(variables)),
            ..Self::new()
        }
    }

    /// Changes an injected variable; has no effect on a process-backed storage.
    pub fn set_variable(&self, name: &str, value: Option<&str>) {
        if let Source::Injected(variables) = &self.source {
            let mut variables = variables.lock().unwrap_or_else(PoisonError::into_inner);
            match value {
                Some(value) => variables.insert(name.to_string(), value.to_string()),
                None => variables.remove(name),
            };
        }
    }

    fn observed(&self) -> MutexGuard<'_, HashMap<String, Observation>> {
        self.observed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Non-empty variables starting with `prefix`, values trimmed.
    fn variables(&self, prefix: &str) -> BTreeMap<String, String> {
        let keep = |(name, value): (String, String)| {
            let trimmed = value.trim();
            (name.starts_with(prefix) && !trimmed.is_empty()).then(|| (name, trimmed.to_string()))
        };
        match &self.source {
            Source::Process => std::env::vars_os()
                .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
                .filter_map(keep)
                .collect(),
            Source::Injected(variables) => variables
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
                .into_iter()
                .filter_map(keep)
                .collect(),
        }
    }

    fn config_prefix(ctx: &LoadContext<'_>, name: &str) -> String {
        format!(
            "{}_{}_",
            encode_segment(&ctx.settings.application_name),
            encode_segment(name)
        )
    }

    fn build_layer(&self, name: &str, layer_location: &Location, ctx: &LoadContext<'_>) -> MemoryLayer {
        let prefix = Self::config_prefix(ctx, name);
        let variables = self.variables(&prefix);
        let mut contents = LayerContents::new();
        for (variable, value) in &variables {
            let encoded_key = &variable[prefix.len()..];
            // `APP_NET__X_...` belongs to configuration `net_x`.
            if encoded_key.starts_with('_') {
                continue;
            }
            match decode_key(encoded_key) {
                Some(key) => {
                    contents.insert(Entry::new(key, value.as_str()));
                }
                None => warn!(storage = %self.id, variable = %variable, "Skipping variable with an invalid key"),
            }
        }
        self.observed()
            .insert(layer_location.uri().to_string(), Observation { prefix, variables });
        MemoryLayer::read_only(layer_location.clone(), contents)
    }
}

impl Default for EnvVarStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for EnvVarStorage {
    fn id(&self) -> &str {
        &self.id
    }

    fn discover(&self, scope: Scope, _ctx: &LoadContext<'_>) -> Vec<Location> {
        if scope != Scope::Session {
            return Vec::new();
        }
        match Location::opaque_uri("env", &[scope.as_str()]) {
            Ok(uri) => vec![Location::new(scope, &self.id, uri)],
            Err(e) => {
                warn!(storage = %self.id, error = %e, "Cannot derive environment location");
                Vec::new()
            }
        }
    }

    fn is_generally_writeable(&self) -> bool {
        false
    }

    fn read_layers(
        &self,
        name: &str,
        location: &Location,
        ctx: &LoadContext<'_>,
    ) -> Result<Vec<Box<dyn Layer>>, LayerError> {
        let layer = self.build_layer(name, &location.child(name), ctx);
        if layer.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Box::new(layer)])
    }

    fn reload_layer(
        &self,
        name: &str,
        layer_location: &Location,
        ctx: &LoadContext<'_>,
    ) -> Result<Box<dyn Layer>, LayerError> {
        Ok(Box::new(self.build_layer(name, layer_location, ctx)))
    }

    fn list_configurations(
        &self,
        location: &Location,
        ctx: &LoadContext<'_>,
    ) -> Vec<DiscoveryInfo> {
        let prefix = format!("{}_", encode_segment(&ctx.settings.application_name));
        let names: BTreeSet<String> = self
            .variables(&prefix)
            .keys()
            .filter_map(|variable| match split_segment(&variable[prefix.len()..]) {
                (name, Some(_)) if !name.is_empty() => Some(name),
                _ => None,
            })
            .collect();
        names
            .into_iter()
            .map(|name| DiscoveryInfo {
                uri: location.child(&name).uri().clone(),
                name,
                scope: location.scope(),
                writeable: false,
                format_id: None,
            })
            .collect()
    }

    fn has_changed(&self, layer_location: &Location) -> bool {
        let uri = layer_location.uri().to_string();
        let Some(prefix) = self.observed().get(&uri).map(|seen| seen.prefix.clone()) else {
            return false;
        };
        let current = self.variables(&prefix);
        let mut observed = self.observed();
        let Some(seen) = observed.get_mut(&uri) else {
            return false;
        };
        if seen.variables == current {
            return false;
        }
        seen.variables = current;
        true
    }
}
