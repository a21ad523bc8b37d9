//! Errors produced by the bootstrap and instance verification flows.

use thiserror::Error;

/// A verification failure, carrying the wire error code from the registry
/// (`MICROSERVICE_INVALID_*`) alongside the HTTP status it maps to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing or malformed Authorization header")]
    InvalidAuth,

    #[error("timestamp missing, malformed, or outside the allowed window")]
    InvalidTimestamp,

    #[error("nonce missing or already used")]
    InvalidNonce,

    #[error("signature header missing")]
    InvalidSignature,

    /// Signature header was present but didn't verify, or the nonce it
    /// protects was replayed. Same wire code as `InvalidSignature`, but a
    /// 401 rather than a 400, matching the original verifier's split
    /// between "malformed request" and "rejected credential".
    #[error("signature verification failed")]
    SignatureMismatch,

    #[error("key id missing or unknown")]
    InvalidKid,

    /// `kid` matched the service's previous key, but the rotation grace
    /// window for that key has elapsed. Distinct from `SignatureMismatch`
    /// so a caller can tell "your key rotated out from under you" apart
    /// from "your signature is simply wrong".
    #[error("previous key's grace window has expired")]
    PrevKeyExpired,

    #[error("instance id missing or malformed")]
    InvalidInstance,

    #[error("no service instance with this id is registered")]
    InstanceNotFound,
}

impl AuthError {
    /// The stable wire code from the registry's error code table.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidAuth => "MICROSERVICE_INVALID_AUTH",
            AuthError::InvalidTimestamp => "MICROSERVICE_INVALID_TIMESTAMP",
            AuthError::InvalidNonce => "MICROSERVICE_INVALID_NONCE",
            AuthError::InvalidSignature | AuthError::SignatureMismatch => {
                "MICROSERVICE_INVALID_SIGNATURE"
            }
            AuthError::InvalidKid => "MICROSERVICE_INVALID_KID",
            AuthError::PrevKeyExpired => "MICROSERVICE_PREV_KEY_EXPIRED",
            AuthError::InvalidInstance => "MICROSERVICE_INVALID_INSTANCE",
            AuthError::InstanceNotFound => "MICROSERVICE_INSTANCE_NOT_FOUND",
        }
    }

    /// The HTTP status this error is reported under.
    pub fn status(&self) -> u16 {
        match self {
            AuthError::SignatureMismatch | AuthError::PrevKeyExpired => 401,
            AuthError::InstanceNotFound => 404,
            _ => 400,
        }
    }

    /// The numeric form of [`Self::code`], stable across deployments. The
    /// original error code registry assigns these as plain integers; this
    /// mapping is an arbitrary but fixed assignment since no deployment has
    /// observed these values yet.
    pub fn numeric_code(&self) -> u32 {
        match self {
            AuthError::InvalidAuth => 40100,
            AuthError::InvalidTimestamp => 40101,
            AuthError::InvalidNonce => 40102,
            AuthError::InvalidSignature => 40103,
            AuthError::SignatureMismatch => 40104,
            AuthError::InvalidKid => 40105,
            AuthError::InvalidInstance => 40106,
            AuthError::InstanceNotFound => 40107,
            AuthError::PrevKeyExpired => 40108,
        }
    }
}
