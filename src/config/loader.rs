//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read a TOML file without semantic validation.
///
/// Used when CLI flags are merged on top before validating.
pub fn read_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[listener]
bind_address = "127.0.0.1:9443"

[backends.legacy]
url = "https://10.0.0.5"
tls_server_name = "mdm.example.com"

[backends.new]
url = "https://fleet.internal"

[migration]
percentage = 25
udids = ["ABC", "DEF"]

[admin]
auth_token = "s3cret"

[observability]
debug = true
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9443");
        assert_eq!(config.migration.percentage, 25);
        assert_eq!(config.migration.udids, vec!["ABC", "DEF"]);
        assert_eq!(config.admin.secret(), Some("s3cret"));
        assert!(config.observability.debug);
        // Untouched sections keep defaults.
        assert_eq!(config.timeouts.read_header_secs, 10);
    }

    #[test]
    fn empty_token_disables_admin() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[admin]\nauth_token = \"\"").unwrap();
        let config = read_config(file.path()).unwrap();
        assert_eq!(config.admin.secret(), None);
    }

    #[test]
    fn validation_errors_are_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[migration]\npercentage = 150").unwrap();
        match load_config(file.path()) {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.field == "migration.percentage"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn parse_errors_are_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[migration\npercentage = ").unwrap();
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
    }
}
