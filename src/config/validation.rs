//! Configuration validation logic.

use crate::config::schema::ServerOptions;

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error: {}", self.0)
    }
}

/// Validate a ServerOptions bundle for semantic correctness.
pub fn validate_options(options: &ServerOptions) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if options.max_connections == 0 {
        errors.push(ValidationError(
            "max_connections must be > 0".to_string(),
        ));
    }
    if options.max_connections_per_peer == 0 {
        errors.push(ValidationError(
            "max_connections_per_peer must be > 0".to_string(),
        ));
    }
    if options.max_connections_per_peer > options.max_connections {
        errors.push(ValidationError(format!(
            "max_connections_per_peer ({}) exceeds max_connections ({})",
            options.max_connections_per_peer, options.max_connections
        )));
    }

    if options.connection_timeout_secs == 0 {
        tracing::warn!("connection_timeout_secs is 0, idle connections close on the first sweep");
    }
    if options.shutdown_timeout_secs == 0 {
        tracing::warn!("shutdown_timeout_secs is 0, stop() will report a timeout immediately");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_defaults() {
        assert!(validate_options(&ServerOptions::default()).is_ok());
    }

    #[test]
    fn test_zero_caps_rejected() {
        let options = ServerOptions {
            max_connections: 0,
            max_connections_per_peer: 0,
            ..ServerOptions::default()
        };
        let errs = validate_options(&options).unwrap_err();
        assert_eq!(errs.len(), 2);
        assert!(errs[0].0.contains("max_connections"));
    }

    #[test]
    fn test_per_peer_above_global_rejected() {
        let options = ServerOptions {
            max_connections: 10,
            max_connections_per_peer: 20,
            ..ServerOptions::default()
        };
        let errs = validate_options(&options).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].0.contains("exceeds max_connections"));
    }
}
