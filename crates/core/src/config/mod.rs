mod loader;
mod types;
mod validate;

pub use loader::{load_settings, load_settings_from_env, load_settings_from_str, ENV_PREFIX};
pub use types::*;
pub use validate::validate_settings;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
