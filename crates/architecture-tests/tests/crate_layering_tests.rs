//! Architecture tests for the dependency direction between workspace crates.
//!
//! The engine crate (`layerconf`) knows only its own traits. Platform
//! integrations live in `layerconf-sources`, which depends on the engine and
//! never the other way around.
//!
//! Invariants:
//! - `crates/core` declares none of the platform crates as dependencies
//! - No source file under `crates/core` names `layerconf_sources`

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Crates reserved for `layerconf-sources`.
const PLATFORM_CRATES: &[&str] = &[
    "layerconf-sources",
    "keyring",
    "dotenvy",
    "directories",
    "toml",
    "tracing-subscriber",
];

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map(Path::to_path_buf)
        .expect("architecture-tests lives two levels below the workspace root")
}

fn manifest(crate_dir: &str) -> toml::Table {
    let path = workspace_root().join("crates").join(crate_dir).join("Cargo.toml");
    let text = fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()));
    text.parse().unwrap_or_else(|e| panic!("{}: {e}", path.display()))
}

fn dependency_names(manifest: &toml::Table, table: &str) -> Vec<String> {
    manifest
        .get(table)
        .and_then(|value| value.as_table())
        .map(|deps| deps.keys().cloned().collect())
        .unwrap_or_default()
}

#[test]
fn test_core_has_no_platform_dependencies() {
    let core = manifest("core");
    let deps = dependency_names(&core, "dependencies");
    let offending: Vec<&String> = deps
        .iter()
        .filter(|name| PLATFORM_CRATES.contains(&name.as_str()))
        .collect();
    assert!(
        offending.is_empty(),
        "crates/core depends on platform crates: {offending:?}"
    );
}

#[test]
fn test_sources_depends_on_core() {
    let sources = manifest("sources");
    assert!(dependency_names(&sources, "dependencies").contains(&"layerconf".to_string()));
}

#[test]
fn test_core_sources_do_not_reference_sources_crate() {
    let core_dir = workspace_root().join("crates/core");
    let violations: Vec<String> = WalkDir::new(&core_dir)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != "target")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "rs"))
        .filter(|entry| {
            fs::read_to_string(entry.path()).is_ok_and(|content| content.contains("layerconf_sources"))
        })
        .map(|entry| entry.path().display().to_string())
        .collect();
    assert!(
        violations.is_empty(),
        "crates/core must not reference layerconf_sources:\n{}",
        violations.join("\n")
    );
}
