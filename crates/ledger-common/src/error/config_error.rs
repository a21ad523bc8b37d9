//! Configuration parsing/loading errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration format: {message}")]
    InvalidFormat { message: String },

    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("invalid value for field '{field}': {value}")]
    InvalidValue { field: String, value: String },

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("failed to parse configuration: {source}")]
    ParseError {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("environment variable error: {var}")]
    EnvError { var: String },
}
