//! Scheme provider reading `*.scheme.json` files.
//!
//! A file `<dir>/<name>.scheme.json` holds the scheme of configuration `<name>`;
//! a document that names its schemes may define several at once.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use layerconf::{ConfigError, Scheme, SchemeProvider, Settings};

/// File suffix of scheme documents.
pub const SCHEME_FILE_SUFFIX: &str = ".scheme.json";

pub struct JsonSchemeProvider {
    directories: Vec<PathBuf>,
}

impl JsonSchemeProvider {
    pub fn new<I, P>(directories: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            directories: directories.into_iter().map(Into::into).collect(),
        }
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    fn read_file(path: &Path, name: &str) -> Result<Vec<(String, Scheme)>, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| {
            ConfigError::InvalidScheme(format!("cannot read {}: {}", path.display(), e.kind()))
        })?;
        Scheme::parse_document(&text, Some(name))
    }
}

impl SchemeProvider for JsonSchemeProvider {
    fn id(&self) -> &str {
        "json-scheme"
    }

    /// Unreadable or invalid files are skipped with a warning.
    fn discover(&self, _settings: &Settings) -> Result<Vec<(String, Scheme)>, ConfigError> {
        let mut schemes = Vec::new();
        for dir in &self.directories {
            let Ok(entries) = fs::read_dir(dir) else {
                debug!(dir = %dir.display(), "Scheme directory not readable");
                continue;
            };
            let mut paths: Vec<PathBuf> = entries.flatten().map(|entry| entry.path()).collect();
            paths.sort();
            for path in paths {
                let Some(name) = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .and_then(|name| name.strip_suffix(SCHEME_FILE_SUFFIX))
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                else {
                    continue;
                };
                match Self::read_file(&path, &name) {
                    Ok(found) => schemes.extend(found),
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping scheme file"),
                }
            }
        }
        Ok(schemes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layerconf::ConfigKey;

    #[test]
    fn test_discovers_scheme_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("net.scheme.json"),
            r#"[{"key": "port", "type": "number", "default": 8080}]"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("multi.scheme.json"),
            r#"[{"name": "a", "entries": []}, {"name": "b", "entries": [{"key": "x"}]}]"#,
        )
        .unwrap();
        fs::write(dir.path().join("broken.scheme.json"), "{").unwrap();
        fs::write(dir.path().join("notes.json"), "{}").unwrap();

        let provider = JsonSchemeProvider::new([dir.path()]);
        let schemes = provider.discover(&Settings::default()).unwrap();
        let names: Vec<&str> = schemes.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "net"]);

        let net = &schemes[2].1;
        assert!(net.get(&ConfigKey::parse("port").unwrap()).is_some());
    }

    #[test]
    fn test_missing_directory_yields_nothing() {
        let provider = JsonSchemeProvider::new(["/nonexistent/layerconf/schemes"]);
        assert!(provider.discover(&Settings::default()).unwrap().is_empty());
    }
}
