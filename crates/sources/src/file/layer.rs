//! A layer backed by one configuration file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use layerconf::{
    ConfigKey, Entry, Format, FormatOptions, Layer, LayerContents, LayerError, Location, MemoryLayer,
};

use super::Stamps;

/// File contents held in memory; `flush` rewrites the whole file atomically.
pub struct FileLayer {
    inner: MemoryLayer,
    path: PathBuf,
    format: Arc<dyn Format>,
    options: FormatOptions,
    stamps: Stamps,
}

impl FileLayer {
    pub(crate) fn new(
        location: Location,
        path: PathBuf,
        contents: LayerContents,
        writeable: bool,
        format: Arc<dyn Format>,
        options: FormatOptions,
        stamps: Stamps,
    ) -> Self {
        Self {
            inner: MemoryLayer::with_contents(location, contents, writeable),
            path,
            format,
            options,
            stamps,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format_id(&self) -> &str {
        self.format.id()
    }

    /// Writes to a temporary file first, then renames it to the target path.
    fn atomic_write(&self, bytes: &[u8]) -> Result<(), LayerError> {
        let write_error = |source: std::io::Error| LayerError::Write {
            location: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        let temp_path = temp_path(&self.path);
        fs::write(&temp_path, bytes).map_err(write_error)?;
        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(write_error(e));
        }
        Ok(())
    }
}

/// `<file>.tmp` next to the target, so the rename stays on one filesystem.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

impl Layer for FileLayer {
    fn location(&self) -> &Location {
        self.inner.location()
    }

    fn entry(&self, key: &ConfigKey) -> Option<Entry> {
        self.inner.entry(key)
    }

    fn keys(&self) -> Option<Vec<ConfigKey>> {
        self.inner.keys()
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn is_writeable(&self) -> bool {
        self.inner.is_writeable()
    }

    fn is_dirty(&self) -> bool {
        self.inner.is_dirty()
    }

    fn write_entry(&mut self, entry: Entry) -> Result<Option<Entry>, LayerError> {
        self.inner.write_entry(entry)
    }

    fn remove_entry(&mut self, key: &ConfigKey) -> Result<Option<Entry>, LayerError> {
        self.inner.remove_entry(key)
    }

    fn flush(&mut self) -> Result<usize, LayerError> {
        if !self.inner.is_dirty() {
            return Ok(0);
        }
        let mut rendered = Vec::new();
        self.format.write(
            self.inner.contents(),
            &mut rendered,
            self.inner.location(),
            &self.options,
        )?;
        self.atomic_write(&rendered)?;
        self.stamps.record(&self.path);

        let written = self.inner.mark_clean();
        debug!(
            path = %self.path.display(),
            format = %self.format.id(),
            entries = written,
            "Configuration file saved atomically"
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_path_keeps_extension() {
        let path = Path::new("/etc/demo/app.toml");
        assert_eq!(temp_path(path), PathBuf::from("/etc/demo/app.toml.tmp"));
    }
}
