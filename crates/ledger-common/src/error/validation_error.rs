//! Request validation errors (register/heartbeat payload shape checks).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("invalid input: {field}")]
    InvalidInput { field: String },

    #[error("value out of range: {field} = {value}")]
    OutOfRange { field: String, value: String },

    #[error("required field missing: {field}")]
    Required { field: String },

    #[error("invalid format: {field}")]
    InvalidFormat { field: String },

    #[error("rate limit exceeded: {limit}")]
    RateLimit { limit: String },
}
