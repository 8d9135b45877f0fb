use crate::document::{
    ConfigDocument, DEBUG, ENABLE_CORS, MONGODB_SETTINGS, SERVER_HOST, SERVER_PORT, SQLDB_SETTINGS,
};
use crate::validation::{self, ValidationError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub(crate) const REDACTED: &str = "***";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing required key `{0}`")]
    MissingKey(String),
    #[error("invalid value for `{key}`: {message}")]
    InvalidType { key: String, message: String },
    #[error("invalid configuration: {}", describe(.0))]
    Invalid(Vec<ValidationError>),
}

fn describe(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestApiConfig {
    #[serde(flatten)]
    pub server: ServerBinding,
    #[serde(rename = "SQLDB_SETTINGS")]
    pub sqldb: RelationalDbConfig,
    #[serde(rename = "MONGODB_SETTINGS")]
    pub mongodb: DocumentDbConfig,
}

/// Where the REST API listens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerBinding {
    #[serde(rename = "SERVER_HOST")]
    pub host: String,
    #[serde(rename = "SERVER_PORT")]
    pub port: u16,
    #[serde(rename = "DEBUG")]
    pub debug: bool,
    /// Usually off when a reverse proxy in front of the API handles CORS.
    #[serde(rename = "ENABLE_CORS")]
    pub cors_enabled: bool,
}

/// Relational (MariaDB/MySQL) connection target
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationalDbConfig {
    #[serde(rename = "db")]
    pub database: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
}

/// Document (MongoDB) connection target
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentDbConfig {
    #[serde(rename = "db")]
    pub database: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(rename = "authentication_source")]
    pub auth_source: String,
}

impl Default for ServerBinding {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            debug: false,
            cors_enabled: false,
        }
    }
}

impl Default for RelationalDbConfig {
    fn default() -> Self {
        Self {
            database: "myrames-prod-db".to_string(),
            user: "mariaUsr".to_string(),
            password: "mariaPwd".to_string(),
            host: "sqldatabase".to_string(),
            port: 3306,
        }
    }
}

impl Default for DocumentDbConfig {
    fn default() -> Self {
        Self {
            database: "history-db".to_string(),
            host: "nosqldatabase".to_string(),
            port: 27017,
            username: "mongoUsr".to_string(),
            password: "mongoPass".to_string(),
            auth_source: "admin".to_string(),
        }
    }
}

impl Default for RestApiConfig {
    fn default() -> Self {
        Self {
            server: ServerBinding::default(),
            sqldb: RelationalDbConfig::default(),
            mongodb: DocumentDbConfig::default(),
        }
    }
}

// Passwords never reach log output through `{:?}`.
impl fmt::Debug for RelationalDbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationalDbConfig")
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &REDACTED)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl fmt::Debug for DocumentDbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentDbConfig")
            .field("database", &self.database)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &REDACTED)
            .field("auth_source", &self.auth_source)
            .finish()
    }
}

impl ServerBinding {
    /// `host:port` string suitable for binding a listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl RestApiConfig {
    /// Extract typed settings from a document, failing on the first key that
    /// is missing or has the wrong type. Errors name the dotted key, e.g.
    /// `MONGODB_SETTINGS.port`.
    pub fn from_document(doc: &ConfigDocument) -> Result<Self, ConfigError> {
        let server = ServerBinding {
            host: typed_value(doc, SERVER_HOST)?,
            port: typed_value(doc, SERVER_PORT)?,
            debug: typed_value(doc, DEBUG)?,
            cors_enabled: typed_value(doc, ENABLE_CORS)?,
        };

        check_settings_keys(doc, SQLDB_SETTINGS, &SQLDB_KEYS)?;
        let sqldb = RelationalDbConfig {
            database: typed_value(doc, "SQLDB_SETTINGS.db")?,
            user: typed_value(doc, "SQLDB_SETTINGS.user")?,
            password: typed_value(doc, "SQLDB_SETTINGS.password")?,
            host: typed_value(doc, "SQLDB_SETTINGS.host")?,
            port: typed_value(doc, "SQLDB_SETTINGS.port")?,
        };

        check_settings_keys(doc, MONGODB_SETTINGS, &MONGODB_KEYS)?;
        let mongodb = DocumentDbConfig {
            database: typed_value(doc, "MONGODB_SETTINGS.db")?,
            host: typed_value(doc, "MONGODB_SETTINGS.host")?,
            port: typed_value(doc, "MONGODB_SETTINGS.port")?,
            username: typed_value(doc, "MONGODB_SETTINGS.username")?,
            password: typed_value(doc, "MONGODB_SETTINGS.password")?,
            auth_source: typed_value(doc, "MONGODB_SETTINGS.authentication_source")?,
        };

        Ok(Self {
            server,
            sqldb,
            mongodb,
        })
    }

    pub fn to_document(&self) -> ConfigDocument {
        let sql = &self.sqldb;
        let mongo = &self.mongodb;

        let entries = BTreeMap::from([
            (SERVER_HOST.to_string(), Value::from(self.server.host.as_str())),
            (SERVER_PORT.to_string(), Value::from(self.server.port)),
            (DEBUG.to_string(), Value::from(self.server.debug)),
            (ENABLE_CORS.to_string(), Value::from(self.server.cors_enabled)),
            (
                SQLDB_SETTINGS.to_string(),
                mapping([
                    ("db", sql.database.as_str().into()),
                    ("user", sql.user.as_str().into()),
                    ("password", sql.password.as_str().into()),
                    ("host", sql.host.as_str().into()),
                    ("port", sql.port.into()),
                ]),
            ),
            (
                MONGODB_SETTINGS.to_string(),
                mapping([
                    ("db", mongo.database.as_str().into()),
                    ("host", mongo.host.as_str().into()),
                    ("port", mongo.port.into()),
                    ("username", mongo.username.as_str().into()),
                    ("password", mongo.password.as_str().into()),
                    ("authentication_source", mongo.auth_source.as_str().into()),
                ]),
            ),
        ]);

        ConfigDocument::from_entries(entries)
    }

    /// Copy with every password replaced, safe to expose or log.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.sqldb.password = REDACTED.to_string();
        copy.mongodb.password = REDACTED.to_string();
        copy
    }
}

const SQLDB_KEYS: [&str; 5] = ["db", "user", "password", "host", "port"];
const MONGODB_KEYS: [&str; 6] = [
    "db",
    "host",
    "port",
    "username",
    "password",
    "authentication_source",
];

fn mapping<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::Mapping(
        entries
            .into_iter()
            .map(|(k, v)| (Value::from(k), v))
            .collect::<Mapping>(),
    )
}

fn typed_value<T: DeserializeOwned>(doc: &ConfigDocument, key: &str) -> Result<T, ConfigError> {
    let value = doc
        .get(key)
        .ok_or_else(|| ConfigError::MissingKey(key.to_string()))?;

    serde_yaml::from_value(value.clone()).map_err(|e| ConfigError::InvalidType {
        key: key.to_string(),
        message: e.to_string(),
    })
}

// Settings mappings keep their documented shape; anything extra is an error.
fn check_settings_keys(
    doc: &ConfigDocument,
    section: &str,
    allowed: &[&str],
) -> Result<(), ConfigError> {
    let settings = doc
        .get(section)
        .ok_or_else(|| ConfigError::MissingKey(section.to_string()))?
        .as_mapping()
        .ok_or_else(|| ConfigError::InvalidType {
            key: section.to_string(),
            message: "expected a mapping".to_string(),
        })?;

    for key in settings.keys() {
        match key.as_str() {
            Some(name) if allowed.contains(&name) => {}
            Some(name) => {
                return Err(ConfigError::InvalidType {
                    key: format!("{}.{}", section, name),
                    message: "unknown key".to_string(),
                })
            }
            None => {
                return Err(ConfigError::InvalidType {
                    key: section.to_string(),
                    message: format!("non-string key {:?}", key),
                })
            }
        }
    }

    Ok(())
}

/// Load, extract and validate the application configuration
pub async fn load_app_config<P: AsRef<Path>>(path: P) -> Result<RestApiConfig, ConfigError> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Loading application configuration");

    let document = ConfigDocument::load(path).await?;
    for key in document.unrecognized_keys() {
        warn!(key = %key, "Ignoring unrecognized configuration key");
    }

    let config = RestApiConfig::from_document(&document)?;
    validation::validate(&config)?;

    info!(
        bind = %config.server.bind_address(),
        sql_host = %config.sqldb.host,
        mongo_host = %config.mongodb.host,
        "Configuration loaded"
    );

    Ok(config)
}
