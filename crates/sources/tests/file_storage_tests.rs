//! Filesystem storage through a configuration factory.
//!
//! Test coverage:
//! - Reading TOML and JSON files from test-mode directories
//! - Format reading priority when several files exist
//! - Automatic file creation on write, atomically and without leftovers
//! - External change detection with last-known-good on parse failure
//! - Listing available configurations
//! - Scheme discovery from `*.scheme.json` files

use std::fs;
use std::path::Path;
use std::sync::Arc;

use layerconf::{ConfigFactory, ConfigFactoryBuilder, Scope, ScopeSet};
use layerconf_sources::{FileStorage, JsonFormat, JsonSchemeProvider, TomlFormat};

fn builder(user_dir: &Path) -> ConfigFactoryBuilder {
    ConfigFactory::builder("acme", "demo")
        .with_test_mode(true)
        .with_test_directory(Scope::User, user_dir)
        .with_storage(Arc::new(FileStorage::new()))
        .with_format(Arc::new(JsonFormat))
        .with_format(Arc::new(TomlFormat))
}

#[test]
fn test_reads_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("app.toml"), "[net]\nport = 8080\n").unwrap();

    let factory = builder(dir.path()).build().unwrap();
    let config = factory.get_config("app").unwrap();

    let entry = config.get_entry("net/port").unwrap().unwrap();
    assert_eq!(entry.as_i64().unwrap(), 8080);
    assert_eq!(entry.scope(), Some(Scope::User));
    let path = entry.location().and_then(|location| location.path()).unwrap();
    assert!(path.ends_with("app.toml"));
}

#[test]
fn test_reading_priority_decides_between_formats() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("app.toml"), "name = \"from-toml\"\nonly_toml = 1\n").unwrap();
    fs::write(dir.path().join("app.json"), r#"{"name": "from-json"}"#).unwrap();

    let factory = builder(dir.path()).build().unwrap();
    let config = factory.get_config("app").unwrap();
    assert_eq!(config.get_string("name").unwrap().as_deref(), Some("from-json"));
    assert_eq!(config.get_i64("only_toml").unwrap(), Some(1));
    drop(config);
    factory.close();

    let factory = builder(dir.path())
        .with_format_reading_priorities(["toml"])
        .build()
        .unwrap();
    let config = factory.get_config("app").unwrap();
    assert_eq!(config.get_string("name").unwrap().as_deref(), Some("from-toml"));
}

#[test]
fn test_put_creates_file_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let user_dir = dir.path().join("user");

    let factory = builder(&user_dir).build().unwrap();
    let config = factory.get_config("app").unwrap();
    config.put("a/b", "v", Scope::User).unwrap();

    let path = user_dir.join("app.json");
    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written, serde_json::json!({"a": {"b": "v"}}));

    let leftovers: Vec<_> = fs::read_dir(&user_dir)
        .unwrap()
        .flatten()
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());

    // The own write is not mistaken for an external change.
    assert_eq!(config.reload().unwrap(), 0);
    assert_eq!(
        config
            .get_entry_in("a/b", ScopeSet::USER)
            .unwrap()
            .unwrap()
            .as_string()
            .unwrap(),
        "v"
    );
}

#[test]
fn test_writing_priority_picks_format() {
    let dir = tempfile::tempdir().unwrap();
    let factory = builder(dir.path())
        .with_format_writing_priorities(["toml"])
        .build()
        .unwrap();
    let config = factory.get_config("app").unwrap();
    config.put("net/port", 9000, Scope::User).unwrap();

    let text = fs::read_to_string(dir.path().join("app.toml")).unwrap();
    assert!(text.contains("[net]"));
    assert!(text.contains("port = 9000"));
}

#[test]
fn test_external_change_and_last_known_good() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.json");
    fs::write(&path, r#"{"greeting": "hello"}"#).unwrap();

    let factory = builder(dir.path()).build().unwrap();
    let config = factory.get_config("app").unwrap();
    assert_eq!(config.get_string("greeting").unwrap().as_deref(), Some("hello"));

    fs::write(&path, r#"{"greeting": "bonjour!"}"#).unwrap();
    assert_eq!(config.get_string("greeting").unwrap().as_deref(), Some("bonjour!"));

    fs::write(&path, r#"{"greeting": "#).unwrap();
    assert_eq!(config.get_string("greeting").unwrap().as_deref(), Some("bonjour!"));

    fs::write(&path, r#"{"greeting": "good evening"}"#).unwrap();
    assert_eq!(
        config.get_string("greeting").unwrap().as_deref(),
        Some("good evening")
    );
}

#[test]
fn test_lists_available_configurations() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("alpha.json"), "{}").unwrap();
    fs::write(dir.path().join("beta.toml"), "").unwrap();
    fs::write(dir.path().join("notes.txt"), "").unwrap();

    let factory = builder(dir.path()).build().unwrap();
    let found = factory.list_available_configurations().unwrap();
    let names: Vec<(&str, Option<&str>)> = found
        .iter()
        .map(|info| (info.name.as_str(), info.format_id.as_deref()))
        .collect();
    assert_eq!(names, vec![("alpha", Some("json")), ("beta", Some("toml"))]);
    assert!(found.iter().all(|info| info.scope == Scope::User));
}

#[test]
fn test_scheme_files_provide_defaults() {
    let config_dir = tempfile::tempdir().unwrap();
    let scheme_dir = tempfile::tempdir().unwrap();
    fs::write(
        scheme_dir.path().join("net.scheme.json"),
        r#"[{"key": "port", "type": "number", "default": 8080}]"#,
    )
    .unwrap();

    let factory = builder(config_dir.path())
        .with_scheme_provider(Arc::new(JsonSchemeProvider::new([scheme_dir.path()])))
        .build()
        .unwrap();
    let net = factory.get_config("net").unwrap();

    let port = net.get_entry("port").unwrap().unwrap();
    assert!(port.is_default());
    assert_eq!(port.as_i64().unwrap(), 8080);
}
