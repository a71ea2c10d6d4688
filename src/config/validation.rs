//! Configuration validation.
//!
//! Serde handles the syntactic side; this pass checks semantics and
//! collects every violation instead of stopping at the first.

use crate::config::schema::GatewayConfig;

/// One semantic violation, pointing at the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, returning all errors found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !config.listener.socket_path.is_absolute() {
        errors.push(ValidationError::new(
            "listener.socket_path",
            "must be an absolute path",
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new(
            "listener.max_connections",
            "must be at least 1",
        ));
    }
    if config.listener.io_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "listener.io_timeout_secs",
            "must be at least 1 second",
        ));
    }
    if config.listener.server_string.is_empty() {
        errors.push(ValidationError::new(
            "listener.server_string",
            "must not be empty",
        ));
    }

    if let Some(creds) = &config.auth.creds {
        if creds.allowed_uids.is_empty() && creds.allowed_gids.is_empty() {
            errors.push(ValidationError::new(
                "auth.creds",
                "needs at least one allowed uid or gid",
            ));
        }
    }
    if let Some(header) = &config.auth.header {
        if header.name.is_empty() {
            errors.push(ValidationError::new("auth.header.name", "must not be empty"));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a valid socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
