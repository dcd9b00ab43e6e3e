//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Validation(_) => None,
        }
    }
}

/// Read and parse a TOML configuration file without validating it.
///
/// Callers that layer overrides on top (the CLI) validate afterwards.
pub fn read_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
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

    fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}.toml", name, std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_valid_file() {
        let path = write_temp(
            "caching-proxy-valid",
            r#"
            [listener]
            port = 8080

            [upstream]
            origin = "http://example.test"
            "#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.upstream.origin, "http://example.test");

        fs::remove_file(path).unwrap_or_default();
    }

    #[test]
    fn reports_parse_errors() {
        let path = write_temp("caching-proxy-broken", "[listener\nport = ");
        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
        fs::remove_file(path).unwrap_or_default();
    }

    #[test]
    fn reports_validation_errors() {
        let path = write_temp(
            "caching-proxy-invalid",
            r#"
            [upstream]
            origin = "not a url"
            "#,
        );
        assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));
        fs::remove_file(path).unwrap_or_default();
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = Path::new("/definitely/not/here/caching-proxy.toml");
        assert!(matches!(load_config(path), Err(ConfigError::Io(_))));
    }
}
