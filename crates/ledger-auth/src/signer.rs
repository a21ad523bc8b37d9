use ledger_core::{Clock, KeyScope, derive_instance_key, instance_canonical_message, sign};
use rand::RngCore;
use std::collections::BTreeMap;

/// Everything the signed-header producer needs about the target instance:
/// its id and the `(kid, token_bytes)` pair currently active for its owning
/// service.
pub struct SigningContext<'a> {
    pub instance_id: &'a str,
    pub kid: &'a str,
    pub token_bytes: &'a [u8],
}

/// Produces the header set the ledger attaches to an outbound push to
/// `instance_id`: a fresh timestamp and nonce, the push-scoped derived key,
/// and the signature over the canonical instance-request string.
///
/// Returned as a `BTreeMap` so callers get a deterministic iteration order
/// (handy for logging and tests) without pulling in an HTTP header type.
pub fn signed_headers(
    clock: &dyn Clock,
    ctx: &SigningContext<'_>,
    method: &str,
    path_with_query: &str,
    body: &[u8],
) -> BTreeMap<String, String> {
    let ts = clock.now_unix();
    let mut nonce_bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = hex::encode(nonce_bytes);

    let key = derive_instance_key(KeyScope::Push, ctx.token_bytes, ctx.instance_id);
    let message = instance_canonical_message(method, path_with_query, ts, &nonce, body);
    let signature = sign(&key, &message);

    let mut headers = BTreeMap::new();
    headers.insert("X-Timestamp".to_string(), ts.to_string());
    headers.insert("X-Nonce".to_string(), nonce);
    headers.insert("X-Signature".to_string(), signature);
    headers.insert("X-Key-Id".to_string(), ctx.kid.to_string());
    headers.insert("X-Signed-Method".to_string(), method.to_uppercase());
    headers.insert("X-Signed-Path-With-Query".to_string(), path_with_query.to_string());
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers
}
