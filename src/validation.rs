use crate::config::{ConfigError, RestApiConfig};
use tracing::{debug, warn};

/// Validation error structure
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

/// Check a loaded configuration before any connection is attempted.
///
/// All violations are collected so an operator can fix them in one pass.
pub fn validate(config: &RestApiConfig) -> Result<(), ConfigError> {
    let errors = collect_errors(config);

    if errors.is_empty() {
        debug!("Configuration passed validation");
        return Ok(());
    }

    for error in &errors {
        warn!(field = %error.field, message = %error.message, "Invalid configuration value");
    }

    Err(ConfigError::Invalid(errors))
}

/// Return every validation error without failing
pub fn collect_errors(config: &RestApiConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let sql = &config.sqldb;
    let mongo = &config.mongodb;

    require_non_empty(&mut errors, "SERVER_HOST", &config.server.host);
    require_port(&mut errors, "SERVER_PORT", config.server.port);

    require_non_empty(&mut errors, "SQLDB_SETTINGS.db", &sql.database);
    require_non_empty(&mut errors, "SQLDB_SETTINGS.user", &sql.user);
    require_non_empty(&mut errors, "SQLDB_SETTINGS.password", &sql.password);
    require_non_empty(&mut errors, "SQLDB_SETTINGS.host", &sql.host);
    require_port(&mut errors, "SQLDB_SETTINGS.port", sql.port);

    require_non_empty(&mut errors, "MONGODB_SETTINGS.db", &mongo.database);
    require_non_empty(&mut errors, "MONGODB_SETTINGS.host", &mongo.host);
    require_port(&mut errors, "MONGODB_SETTINGS.port", mongo.port);
    require_non_empty(&mut errors, "MONGODB_SETTINGS.username", &mongo.username);
    require_non_empty(&mut errors, "MONGODB_SETTINGS.password", &mongo.password);
    require_non_empty(
        &mut errors,
        "MONGODB_SETTINGS.authentication_source",
        &mongo.auth_source,
    );

    errors
}

/// Keys whose values are plaintext credentials
pub fn plaintext_secrets(config: &RestApiConfig) -> Vec<&'static str> {
    let mut keys = Vec::new();

    if !config.sqldb.password.is_empty() {
        keys.push("SQLDB_SETTINGS.password");
    }
    if !config.mongodb.password.is_empty() {
        keys.push("MONGODB_SETTINGS.password");
    }

    keys
}

fn require_non_empty(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError::new(field, "must not be empty"));
    }
}

// u16 already bounds the top of the range.
fn require_port(errors: &mut Vec<ValidationError>, field: &str, port: u16) {
    if port == 0 {
        errors.push(ValidationError::new(field, "must be between 1 and 65535"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&RestApiConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_port_is_rejected() {
        let mut config = RestApiConfig::default();
        config.sqldb.port = 0;

        let errors = collect_errors(&config);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "SQLDB_SETTINGS.port");
    }

    #[test]
    fn test_all_errors_are_reported() {
        let mut config = RestApiConfig::default();
        config.server.port = 0;
        config.sqldb.user = String::new();
        config.mongodb.auth_source = "   ".to_string();

        match validate(&config) {
            Err(ConfigError::Invalid(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(
                    fields,
                    vec![
                        "SERVER_PORT",
                        "SQLDB_SETTINGS.user",
                        "MONGODB_SETTINGS.authentication_source"
                    ]
                );
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_plaintext_secrets_are_named() {
        let mut config = RestApiConfig::default();
        assert_eq!(
            plaintext_secrets(&config),
            vec!["SQLDB_SETTINGS.password", "MONGODB_SETTINGS.password"]
        );

        config.mongodb.password.clear();
        assert_eq!(plaintext_secrets(&config), vec!["SQLDB_SETTINGS.password"]);
    }
}
