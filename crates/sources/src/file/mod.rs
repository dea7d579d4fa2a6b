//! Filesystem storage.
//!
//! Responsibilities:
//! - Discover one directory location per configured directory of each scope.
//! - Read `<dir>/<name>.<ext>` with every registered format, in reading-priority order.
//! - Create new files with the highest writing-priority format.
//! - Detect external changes by comparing (mtime, length) stamps.
//!
//! Does NOT handle:
//! - Parsing or rendering documents (see `format`).
//! - Deriving directories (see `dirs`).
//!
//! Invariants:
//! - Files are only ever replaced by an atomic rename; readers never see a partial file.
//! - A layer's own flush records the new stamp, so it is not reported as an external change.
//! - Parse errors never include file content.

mod layer;

pub use layer::FileLayer;

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use tracing::{debug, warn};

use layerconf::{
    DiscoveryInfo, Format, Layer, LayerContents, LayerError, LoadContext, Location, Scope, Storage,
};

use crate::dirs::scope_directories;

/// Default id of the filesystem storage.
pub const FILE_STORAGE_ID: &str = "file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl FileStamp {
    fn of(path: &Path) -> Option<FileStamp> {
        let metadata = fs::metadata(path).ok()?;
        Some(FileStamp {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }
}

/// Last observed stamp per file, shared between a storage and its layers.
#[derive(Clone, Default)]
pub(crate) struct Stamps(Arc<Mutex<HashMap<PathBuf, Option<FileStamp>>>>);

impl Stamps {
    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Option<FileStamp>>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn record(&self, path: &Path) {
        self.lock().insert(path.to_path_buf(), FileStamp::of(path));
    }

    /// True when the file differs from the last observation; records the new stamp.
    fn changed(&self, path: &Path) -> bool {
        let current = FileStamp::of(path);
        match self.lock().insert(path.to_path_buf(), current) {
            Some(previous) => previous != current,
            None => false,
        }
    }
}

pub struct FileStorage {
    id: String,
    stamps: Stamps,
}

impl FileStorage {
    pub fn new() -> Self {
        Self::with_id(FILE_STORAGE_ID)
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stamps: Stamps::default(),
        }
    }

    fn load(
        &self,
        path: &Path,
        scope: Scope,
        format: &Arc<dyn Format>,
        ctx: &LoadContext<'_>,
    ) -> Result<FileLayer, LayerError> {
        // Recorded before reading so a write racing the read shows up as a change.
        self.stamps.record(path);
        let location = Location::for_path(scope, &self.id, path)?.with_format(format.id());
        let file = File::open(path).map_err(|source| LayerError::Read {
            location: path.display().to_string(),
            source,
        })?;
        let writeable = file
            .metadata()
            .map(|metadata| !metadata.permissions().readonly())
            .unwrap_or(false);
        let options = ctx.format_options();
        let contents = format.read(&mut BufReader::new(file), &location, &options)?;
        debug!(path = %path.display(), format = %format.id(), entries = contents.len(), "Loaded configuration file");

        Ok(FileLayer::new(
            location,
            path.to_path_buf(),
            contents,
            writeable,
            Arc::clone(format),
            options,
            self.stamps.clone(),
        ))
    }

    fn empty_layer(
        &self,
        path: &Path,
        scope: Scope,
        format: &Arc<dyn Format>,
        ctx: &LoadContext<'_>,
    ) -> Result<FileLayer, LayerError> {
        self.stamps.record(path);
        let location = Location::for_path(scope, &self.id, path)?.with_format(format.id());
        Ok(FileLayer::new(
            location,
            path.to_path_buf(),
            LayerContents::new(),
            true,
            Arc::clone(format),
            ctx.format_options(),
            self.stamps.clone(),
        ))
    }
}

impl Default for FileStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn path_of(location: &Location) -> Result<&Path, LayerError> {
    location
        .path()
        .ok_or_else(|| LayerError::InvalidLocation(location.uri().to_string()))
}

impl Storage for FileStorage {
    fn id(&self) -> &str {
        &self.id
    }

    fn discover(&self, scope: Scope, ctx: &LoadContext<'_>) -> Vec<Location> {
        scope_directories(ctx.settings, scope)
            .into_iter()
            .filter_map(|dir| match Location::for_path(scope, &self.id, &dir) {
                Ok(location) => Some(location),
                Err(e) => {
                    warn!(storage = %self.id, dir = %dir.display(), error = %e, "Skipping directory");
                    None
                }
            })
            .collect()
    }

    fn is_generally_writeable(&self) -> bool {
        true
    }

    fn read_layers(
        &self,
        name: &str,
        location: &Location,
        ctx: &LoadContext<'_>,
    ) -> Result<Vec<Box<dyn Layer>>, LayerError> {
        let dir = path_of(location)?;
        let mut layers: Vec<Box<dyn Layer>> = Vec::new();
        for format in ctx.reading_formats {
            for ext in format.extensions() {
                let path = dir.join(format!("{name}.{ext}"));
                if !path.is_file() {
                    continue;
                }
                match self.load(&path, location.scope(), format, ctx) {
                    Ok(layer) => layers.push(Box::new(layer)),
                    Err(e) => warn!(
                        storage = %self.id,
                        path = %path.display(),
                        error = %e,
                        "Skipping configuration file"
                    ),
                }
            }
        }
        Ok(layers)
    }

    fn create_layer(
        &self,
        name: &str,
        location: &Location,
        ctx: &LoadContext<'_>,
    ) -> Result<Option<Box<dyn Layer>>, LayerError> {
        let dir = path_of(location)?;
        let Some((format, ext)) = ctx
            .writing_formats
            .iter()
            .find_map(|format| format.extensions().first().map(|ext| (format, *ext)))
        else {
            return Ok(None);
        };
        fs::create_dir_all(dir).map_err(|source| LayerError::Write {
            location: dir.display().to_string(),
            source,
        })?;

        let path = dir.join(format!("{name}.{ext}"));
        let layer = if path.is_file() {
            self.load(&path, location.scope(), format, ctx)?
        } else {
            self.empty_layer(&path, location.scope(), format, ctx)?
        };
        debug!(storage = %self.id, path = %path.display(), "Created configuration layer");
        Ok(Some(Box::new(layer)))
    }

    fn reload_layer(
        &self,
        _name: &str,
        layer_location: &Location,
        ctx: &LoadContext<'_>,
    ) -> Result<Box<dyn Layer>, LayerError> {
        let path = path_of(layer_location)?;
        let format = layer_location
            .format_id()
            .and_then(|id| ctx.format(id))
            .ok_or_else(|| LayerError::InvalidLocation(layer_location.uri().to_string()))?;
        let layer = if path.is_file() {
            self.load(path, layer_location.scope(), format, ctx)?
        } else {
            self.empty_layer(path, layer_location.scope(), format, ctx)?
        };
        Ok(Box::new(layer))
    }

    fn list_configurations(
        &self,
        location: &Location,
        ctx: &LoadContext<'_>,
    ) -> Vec<DiscoveryInfo> {
        let Ok(dir) = path_of(location) else {
            return Vec::new();
        };
        let Ok(entries) = fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let matched = ctx.reading_formats.iter().find_map(|format| {
                format.extensions().iter().find_map(|ext| {
                    file_name
                        .strip_suffix(ext)
                        .and_then(|stem| stem.strip_suffix('.'))
                        .filter(|stem| !stem.is_empty())
                        .map(|stem| (stem.to_string(), format.id().to_string()))
                })
            });
            let Some((name, format_id)) = matched else {
                continue;
            };
            let Ok(file_location) = Location::for_path(location.scope(), &self.id, &path) else {
                continue;
            };
            let writeable = entry
                .metadata()
                .map(|metadata| !metadata.permissions().readonly())
                .unwrap_or(false);
            found.push(DiscoveryInfo {
                name,
                scope: location.scope(),
                uri: file_location.uri().clone(),
                writeable,
                format_id: Some(format_id),
            });
        }
        found
    }

    fn has_changed(&self, layer_location: &Location) -> bool {
        layer_location
            .path()
            .is_some_and(|path| self.stamps.changed(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_stamps_detect_external_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.json");
        fs::write(&path, "{}").unwrap();

        let stamps = Stamps::default();
        assert!(!stamps.changed(&path), "first observation is not a change");
        assert!(!stamps.changed(&path));

        let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"\n\n").unwrap();
        drop(file);
        assert!(stamps.changed(&path));
        assert!(!stamps.changed(&path));
    }

    #[test]
    fn test_recorded_write_is_not_a_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.json");
        let stamps = Stamps::default();
        stamps.record(&path);

        fs::write(&path, "{\"a\": 1}").unwrap();
        stamps.record(&path);
        assert!(!stamps.changed(&path));
    }

    #[test]
    fn test_deleted_file_is_a_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.json");
        fs::write(&path, "{}").unwrap();
        let stamps = Stamps::default();
        stamps.record(&path);

        fs::remove_file(&path).unwrap();
        assert!(stamps.changed(&path));
    }
}
