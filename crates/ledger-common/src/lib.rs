//! Shared infrastructure for the ledger: configuration and error types.

pub mod config;
pub mod error;

pub use config::LedgerConfig;
pub use error::{
    AuthError, BaseError, ConfigError, DatabaseError, Result, SerializationError, ValidationError,
};
