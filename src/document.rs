use crate::config::{ConfigError, RestApiConfig};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

pub const SERVER_HOST: &str = "SERVER_HOST";
pub const SERVER_PORT: &str = "SERVER_PORT";
pub const DEBUG: &str = "DEBUG";
pub const ENABLE_CORS: &str = "ENABLE_CORS";
pub const SQLDB_SETTINGS: &str = "SQLDB_SETTINGS";
pub const MONGODB_SETTINGS: &str = "MONGODB_SETTINGS";

/// Top-level keys a host application looks up.
pub const KNOWN_KEYS: [&str; 6] = [
    SERVER_HOST,
    SERVER_PORT,
    DEBUG,
    ENABLE_CORS,
    SQLDB_SETTINGS,
    MONGODB_SETTINGS,
];

/// Read-only key/value view of the configuration.
///
/// Values are kept exactly as they were declared, tags and non-finite floats
/// included. A non-numeric port stays a string here; turning values into
/// typed settings is the job of [`RestApiConfig::from_document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigDocument {
    entries: BTreeMap<String, Value>,
}

impl ConfigDocument {
    /// Document holding the built-in deployment values.
    pub fn defaults() -> Self {
        RestApiConfig::default().to_document()
    }

    pub(crate) fn from_entries(entries: BTreeMap<String, Value>) -> Self {
        Self { entries }
    }

    /// Look up a top-level key or a dotted path such as `SQLDB_SETTINGS.port`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut segments = key.split('.');
        let mut current = self.entries.get(segments.next()?)?;

        for segment in segments {
            current = current.as_mapping()?.get(segment)?;
        }

        Some(current)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-level keys present in the document that no host reads.
    pub fn unrecognized_keys(&self) -> Vec<&str> {
        self.keys().filter(|k| !KNOWN_KEYS.contains(k)).collect()
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Fails on values JSON cannot carry (tags, non-finite floats, non-string
    /// mapping keys) instead of rewriting them.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        let entries = self
            .iter()
            .map(|(key, value)| to_json_value(key, value).map(|v| (key.to_string(), v)))
            .collect::<Result<serde_json::Map<_, _>, _>>()?;

        Ok(serde_json::to_string_pretty(&entries)?)
    }

    /// Load a document from disk. `.json` files are parsed as JSON, anything
    /// else as YAML.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let is_json = path.extension().and_then(|s| s.to_str()) == Some("json");
        debug!(path = %path.display(), json = is_json, "Parsing configuration document");

        let document = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_yaml_str(&content)?
        };

        debug!(keys = document.len(), "Configuration document loaded");
        Ok(document)
    }
}

fn to_json_value(key: &str, value: &Value) -> Result<serde_json::Value, ConfigError> {
    let unrepresentable = |message: &str| ConfigError::InvalidType {
        key: key.to_string(),
        message: message.to_string(),
    };

    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u.into()
            } else if let Some(i) = n.as_i64() {
                i.into()
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(serde_json::Value::Number)
                    .ok_or_else(|| unrepresentable("non-finite number has no JSON form"))?
            }
        }
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Sequence(items) => serde_json::Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| to_json_value(&format!("{}.{}", key, i), item))
                .collect::<Result<_, _>>()?,
        ),
        Value::Mapping(mapping) => {
            let mut object = serde_json::Map::new();
            for (k, v) in mapping {
                let k = k
                    .as_str()
                    .ok_or_else(|| unrepresentable("mapping key is not a string"))?;
                object.insert(k.to_string(), to_json_value(&format!("{}.{}", key, k), v)?);
            }
            serde_json::Value::Object(object)
        }
        Value::Tagged(tagged) => {
            return Err(unrepresentable(&format!(
                "tagged value `{}` has no JSON form",
                tagged.tag
            )))
        }
    })
}
