//! Top-level error enum.
//!
//! Aggregates every subsystem's error type so the rest of the workspace can
//! propagate with `?` instead of hand-converting at every call site.

use super::{AuthError, ConfigError, DatabaseError, SerializationError, ValidationError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BaseError {
    /// Bootstrap/instance signature verification failure.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Registration or heartbeat state-machine failure.
    #[error("registry error: {message}")]
    Registry { message: String },

    /// Snapshot fanout failure (never fatal to the caller, used for logging).
    #[error("fanout error: {message}")]
    Fanout { message: String },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("general error: {message}")]
    General { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl BaseError {
    pub fn general(message: impl Into<String>) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn registry(message: impl Into<String>) -> Self {
        Self::Registry {
            message: message.into(),
        }
    }

    pub fn fanout(message: impl Into<String>) -> Self {
        Self::Fanout {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BaseError>;
