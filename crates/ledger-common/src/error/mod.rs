//! Error types.
//!
//! One file per concern, aggregated into a single top-level enum so callers
//! can use `?` without hand-converting between subsystem error types.

mod auth_error;
mod base_error;
mod config_error;
mod database_error;
mod serialization_error;
mod validation_error;

pub use auth_error::AuthError;
pub use base_error::{BaseError, Result};
pub use config_error::ConfigError;
pub use database_error::DatabaseError;
pub use serialization_error::SerializationError;
pub use validation_error::ValidationError;
