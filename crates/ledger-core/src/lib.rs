//! Canonical message formats and HMAC primitives shared by every signing
//! and verification path in the ledger.
//!
//! This crate has no knowledge of HTTP, storage, or the registry's data
//! model — it only knows how to build the bytes that get signed and how to
//! sign/verify them.

mod clock;
mod derive;
mod hmac_sig;
mod token;

pub use clock::{Clock, SystemClock};
pub use derive::{KeyScope, derive_instance_key};
pub use hmac_sig::{SignatureError, sign, verify};
pub use token::token_to_bytes;

/// Builds the canonical string (minus trailing body bytes) for a per-instance
/// signed request.
///
/// `METHOD "\n" PATH_WITH_QUERY "\n" TIMESTAMP "\n" NONCE "\n"` — the body is
/// appended verbatim by the caller, never re-encoded, so it is returned
/// separately rather than concatenated here.
pub fn instance_canonical_prefix(method: &str, path_with_query: &str, ts: i64, nonce: &str) -> String {
    format!("{}\n{}\n{}\n{}\n", method.to_uppercase(), path_with_query, ts, nonce)
}

/// Builds the full canonical message (prefix + body) for a per-instance
/// signed request.
pub fn instance_canonical_message(
    method: &str,
    path_with_query: &str,
    ts: i64,
    nonce: &str,
    body: &[u8],
) -> Vec<u8> {
    let mut msg = instance_canonical_prefix(method, path_with_query, ts, nonce).into_bytes();
    msg.extend_from_slice(body);
    msg
}

/// Builds the canonical message for a bootstrap-token signed request:
/// `TIMESTAMP "." NONCE` followed immediately by the raw body bytes.
pub fn bootstrap_canonical_message(ts: i64, nonce: &str, body: &[u8]) -> Vec<u8> {
    let mut msg = format!("{ts}.{nonce}").into_bytes();
    msg.extend_from_slice(body);
    msg
}
