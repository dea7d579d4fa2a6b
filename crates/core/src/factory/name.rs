use crate::error::ConfigError;

/// Normalizes a configuration name: trims, collapses inner whitespace to a single
/// space and accepts only `[A-Za-z0-9._ -]`.
///
/// Names are used as file stems and provider paths, so a leading `.` is rejected.
pub fn sanitize_config_name(raw: &str) -> Result<String, ConfigError> {
    let name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ' ' | '-');
    if name.is_empty() || name.starts_with('.') || !name.chars().all(allowed) {
        return Err(ConfigError::InvalidConfigName(raw.to_string()));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_and_collapses_whitespace() {
        assert_eq!(sanitize_config_name("  my   app\tconfig ").unwrap(), "my app config");
        assert_eq!(sanitize_config_name("network-v2.prod").unwrap(), "network-v2.prod");
    }

    #[test]
    fn test_rejects_unsafe_names() {
        for raw in ["", "   ", "../etc", ".hidden", "a/b", "a\\b", "naïve"] {
            assert!(
                matches!(sanitize_config_name(raw), Err(ConfigError::InvalidConfigName(_))),
                "{raw:?} should be rejected"
            );
        }
    }
}
