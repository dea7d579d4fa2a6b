//! Per-scope directory derivation.
//!
//! Responsibilities:
//! - Map a scope to the directories a filesystem-backed collaborator searches.
//! - Use the `directories` crate for platform-appropriate user and data paths.
//!
//! Does NOT handle:
//! - File I/O operations.
//!
//! Invariants:
//! - In test mode the configured test directories replace the defaults of their scope.
//! - Additional directories are appended after the defaults.
//! - `sub_path` is appended to every returned directory.
//! - The result contains no duplicates and keeps first-seen order.

use std::path::PathBuf;

use layerconf::{Scope, Settings};

/// Directories searched for `scope`, most specific first.
pub fn scope_directories(settings: &Settings, scope: Scope) -> Vec<PathBuf> {
    let mut directories = if settings.test_mode {
        settings
            .test_mode_directories
            .get(&scope)
            .cloned()
            .unwrap_or_default()
    } else if settings.no_default_directories {
        Vec::new()
    } else {
        default_directories(settings, scope)
    };
    if let Some(additional) = settings.additional_directories.get(&scope) {
        directories.extend(additional.iter().cloned());
    }

    let mut unique = Vec::with_capacity(directories.len());
    for directory in directories {
        let directory = match &settings.sub_path {
            Some(sub_path) => directory.join(sub_path),
            None => directory,
        };
        if !unique.contains(&directory) {
            unique.push(directory);
        }
    }
    unique
}

/// Platform defaults for `scope`; scopes without a filesystem home yield nothing.
pub fn default_directories(settings: &Settings, scope: Scope) -> Vec<PathBuf> {
    let project = directories::ProjectDirs::from(
        "",
        &settings.company_name,
        &settings.application_name,
    );
    match scope {
        Scope::User => project
            .map(|dirs| vec![dirs.config_dir().to_path_buf()])
            .unwrap_or_default(),
        Scope::Application => project
            .map(|dirs| vec![dirs.data_dir().to_path_buf()])
            .unwrap_or_default(),
        Scope::Host => host_directories(settings),
        _ => Vec::new(),
    }
}

#[cfg(unix)]
fn host_directories(settings: &Settings) -> Vec<PathBuf> {
    let etc = PathBuf::from("/etc");
    vec![
        etc.join(&settings.company_name)
            .join(&settings.application_name),
        etc.join(&settings.application_name),
    ]
}

#[cfg(not(unix))]
fn host_directories(_settings: &Settings) -> Vec<PathBuf> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            company_name: "acme".to_string(),
            application_name: "demo".to_string(),
            ..Settings::default()
        }
    }

    #[test]
    fn test_test_mode_replaces_defaults() {
        let mut settings = settings();
        settings.test_mode = true;
        settings
            .test_mode_directories
            .insert(Scope::User, vec![PathBuf::from("/srv/conf/user-a")]);

        assert_eq!(
            scope_directories(&settings, Scope::User),
            vec![PathBuf::from("/srv/conf/user-a")]
        );
        assert!(scope_directories(&settings, Scope::Application).is_empty());
    }

    #[test]
    fn test_additional_directories_and_sub_path() {
        let mut settings = settings();
        settings.no_default_directories = true;
        settings.sub_path = Some(PathBuf::from("plugins"));
        settings.additional_directories.insert(
            Scope::Host,
            vec![PathBuf::from("/srv/a"), PathBuf::from("/srv/a")],
        );

        assert_eq!(
            scope_directories(&settings, Scope::Host),
            vec![PathBuf::from("/srv/a/plugins")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_host_defaults_live_under_etc() {
        let directories = default_directories(&settings(), Scope::Host);
        assert_eq!(
            directories,
            vec![PathBuf::from("/etc/acme/demo"), PathBuf::from("/etc/demo")]
        );
    }

    #[test]
    fn test_runtime_has_no_directories() {
        assert!(default_directories(&settings(), Scope::Runtime).is_empty());
        assert!(default_directories(&settings(), Scope::Session).is_empty());
    }
}
