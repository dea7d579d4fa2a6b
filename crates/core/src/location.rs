//! Source locations.
//!
//! A `Location` names where a layer comes from: its scope, the storage that
//! produced it, an optional format, a URI reference and, for filesystem
//! sources, a path. Locations never point back at layers.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use url::Url;

use crate::error::LayerError;
use crate::scope::Scope;

#[derive(Debug, Clone)]
pub struct Location {
    scope: Scope,
    storage_id: Arc<str>,
    format_id: Option<Arc<str>>,
    uri: Url,
    path: Option<PathBuf>,
}

impl Location {
    pub fn new(scope: Scope, storage_id: &str, uri: Url) -> Self {
        Self {
            scope,
            storage_id: Arc::from(storage_id),
            format_id: None,
            uri,
            path: None,
        }
    }

    /// A location for a filesystem directory or file.
    pub fn for_path(scope: Scope, storage_id: &str, path: &Path) -> Result<Self, LayerError> {
        let absolute = std::path::absolute(path)
            .map_err(|_| LayerError::InvalidLocation(path.display().to_string()))?;
        let uri = Url::from_file_path(&absolute)
            .map_err(|_| LayerError::InvalidLocation(absolute.display().to_string()))?;
        Ok(Self::new(scope, storage_id, uri).with_path(absolute))
    }

    /// Builds `<scheme>:///<segment>/<segment>...` with each segment percent-encoded.
    pub fn opaque_uri(scheme: &str, segments: &[&str]) -> Result<Url, LayerError> {
        let mut uri = Url::parse(&format!("{scheme}:///"))
            .map_err(|e| LayerError::InvalidLocation(format!("{scheme}: {e}")))?;
        uri.path_segments_mut()
            .map_err(|_| LayerError::InvalidLocation(scheme.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(uri)
    }

    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with_format(mut self, format_id: &str) -> Self {
        self.format_id = Some(Arc::from(format_id));
        self
    }

    /// A location one level below this one, such as a file inside a directory.
    pub fn child(&self, segment: &str) -> Location {
        let mut uri = self.uri.clone();
        if let Ok(mut segments) = uri.path_segments_mut() {
            segments.pop_if_empty().push(segment);
        }
        Location {
            scope: self.scope,
            storage_id: Arc::clone(&self.storage_id),
            format_id: self.format_id.clone(),
            uri,
            path: self.path.as_ref().map(|path| path.join(segment)),
        }
    }

    /// Scope this location contributes to.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn storage_id(&self) -> &str {
        &self.storage_id
    }

    pub fn format_id(&self) -> Option<&str> {
        self.format_id.as_deref()
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Filesystem path, for file-backed locations only.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.scope == other.scope
            && self.storage_id == other.storage_id
            && self.format_id == other.format_id
            && self.uri == other.uri
    }
}

impl Eq for Location {}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.scope, self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_uri_encodes_segments() {
        let uri = Location::opaque_uri("memory", &["runtime", "my app"]).unwrap();
        assert_eq!(uri.as_str(), "memory:///runtime/my%20app");
    }

    #[test]
    fn test_child_extends_uri_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let location = Location::for_path(Scope::User, "files", dir.path())
            .unwrap()
            .with_format("json");
        let child = location.child("app.json");

        assert_eq!(child.scope(), Scope::User);
        assert_eq!(child.format_id(), Some("json"));
        assert_eq!(child.path().unwrap(), dir.path().join("app.json").as_path());
        assert!(child.uri().as_str().ends_with("/app.json"));
    }

    #[test]
    fn test_equality_ignores_path() {
        let uri = Location::opaque_uri("memory", &["a"]).unwrap();
        let a = Location::new(Scope::Runtime, "memory", uri.clone());
        let b = Location::new(Scope::Runtime, "memory", uri).with_path(PathBuf::from("/x"));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "[runtime] memory:///a");
    }
}
