// Library exports for the REST API host and its tests

pub mod config;
pub mod data_source;
pub mod document;
pub mod server;
pub mod validation;

// Re-export commonly used types
pub use config::{
    load_app_config, ConfigError, DocumentDbConfig, RelationalDbConfig, RestApiConfig,
    ServerBinding,
};
pub use document::ConfigDocument;
pub use server::AppState;
