//! Top-level application error, aggregating every subsystem error and
//! mapping it onto the `{code, message, dev}` HTTP envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ledger_common::{AuthError, BaseError};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("ledger error: {0}")]
    Base(#[from] BaseError),

    #[error("configuration error: {0}")]
    Config(#[from] Box<dyn std::error::Error>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request rejected: {field}")]
    BadRequest { field: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn bad_request(field: impl Into<String>) -> Self {
        Self::BadRequest {
            field: field.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    code: u32,
    message: String,
    dev: String,
}

/// Carries whether the `dev` field should be populated; threaded through
/// from [`crate::state::AppState::debug`] at the point a response is built.
pub struct Rendered(pub Error, pub bool);

impl IntoResponse for Rendered {
    fn into_response(self) -> Response {
        let Rendered(err, debug) = self;
        let (status, code, message) = match &err {
            Error::Base(BaseError::Auth(auth_err)) => (
                status_from_u16(auth_err.status()),
                auth_err.numeric_code(),
                public_message(auth_err),
            ),
            Error::Base(BaseError::Validation(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, 42200, "request failed validation".to_string())
            }
            Error::Base(BaseError::Registry { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, 50000, "registration could not be completed".to_string())
            }
            Error::Base(BaseError::Database(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, 50001, "storage error".to_string())
            }
            Error::BadRequest { field } => (
                StatusCode::BAD_REQUEST,
                40000,
                format!("invalid request: {field}"),
            ),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, 50099, "internal error".to_string()),
        };

        let dev = if debug { err.to_string() } else { String::new() };

        (status, Json(ErrorEnvelope { code, message, dev })).into_response()
    }
}

fn status_from_u16(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

fn public_message(err: &AuthError) -> String {
    match err {
        AuthError::InvalidAuth => "missing or malformed authentication".to_string(),
        AuthError::InvalidTimestamp => "timestamp missing, malformed, or expired".to_string(),
        AuthError::InvalidNonce => "nonce missing or already used".to_string(),
        AuthError::InvalidSignature | AuthError::SignatureMismatch => {
            "signature verification failed".to_string()
        }
        AuthError::InvalidKid => "unknown signing key".to_string(),
        AuthError::PrevKeyExpired => "previous signing key has expired".to_string(),
        AuthError::InvalidInstance => "instance id missing or malformed".to_string(),
        AuthError::InstanceNotFound => "no such instance".to_string(),
    }
}
