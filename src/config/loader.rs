//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::ServerOptions;
use crate::config::validation::{validate_options, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for the schema.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The parsed options fail semantic validation.
    #[error("Validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate server options from a TOML file.
pub fn load_options(path: &Path) -> Result<ServerOptions, ConfigError> {
    let content = fs::read_to_string(path)?;
    let options: ServerOptions = toml::from_str(&content)?;

    validate_options(&options).map_err(ConfigError::Validation)?;

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_file() {
        let options: ServerOptions =
            toml::from_str("max_connections = 64\nconnection_timeout_secs = 5\n").unwrap();
        assert_eq!(options.max_connections, 64);
        assert_eq!(options.connection_timeout_secs, 5);
        // Unspecified fields fall back to defaults.
        assert_eq!(options.max_connections_per_peer, 30);
    }

    #[test]
    fn test_invalid_options_surface_validation_error() {
        let options: ServerOptions = toml::from_str("max_connections = 0\n").unwrap();
        assert!(validate_options(&options).is_err());
    }
}
