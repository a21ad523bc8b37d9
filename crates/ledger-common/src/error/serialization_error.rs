//! Serialization/deserialization/encoding errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("invalid format: {format}")]
    InvalidFormat { format: String },
}
