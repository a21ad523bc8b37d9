use ledger_common::AuthError;
use ledger_core::{Clock, KeyScope, derive_instance_key, instance_canonical_message, verify as hmac_verify};
use ledger_secrets::{SecretBackend, SecretStore};
use ledger_store::{NonceStore, RecordOutcome};

/// Verifies a per-instance-signed request (an already-registered instance
/// calling back into the ledger), selecting the current or previous signing
/// key by `kid`. Ordering mirrors [`crate::bootstrap::verify_bootstrap`]:
/// malformed-field checks first, then nonce recording, then signature
/// verification.
#[allow(clippy::too_many_arguments)]
pub async fn verify_instance<B: SecretBackend>(
    clock: &dyn Clock,
    secrets: &SecretStore<B>,
    nonces: &NonceStore,
    ts_window_secs: i64,
    bootstrap_secret_ref: &str,
    secret_ttl_s: i64,
    instance_id: &str,
    method: &str,
    path_with_query: &str,
    ts_raw: Option<&str>,
    nonce: Option<&str>,
    kid: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
) -> Result<(), AuthError> {
    let ts: i64 = ts_raw
        .ok_or(AuthError::InvalidTimestamp)?
        .parse()
        .map_err(|_| AuthError::InvalidTimestamp)?;

    let nonce = nonce.filter(|n| !n.is_empty()).ok_or(AuthError::InvalidNonce)?;
    let kid = kid.filter(|k| !k.is_empty()).ok_or(AuthError::InvalidKid)?;

    if (clock.now_unix() - ts).abs() > ts_window_secs {
        return Err(AuthError::InvalidTimestamp);
    }

    match nonces
        .record_instance(instance_id, nonce)
        .await
        .map_err(|_| AuthError::SignatureMismatch)?
    {
        RecordOutcome::Inserted => {}
        RecordOutcome::Duplicate => return Err(AuthError::SignatureMismatch),
    }

    let signature = signature.ok_or(AuthError::InvalidSignature)?;
    if signature.len() <= 7 || !signature[..7].eq_ignore_ascii_case("sha256=") {
        return Err(AuthError::InvalidSignature);
    }

    let secret = secrets
        .get(bootstrap_secret_ref, secret_ttl_s)
        .await
        .map_err(|_| AuthError::SignatureMismatch)?
        .ok_or(AuthError::SignatureMismatch)?;

    let token_bytes = if kid == secret.kid {
        secret.token_bytes.clone()
    } else if secret.prev_kid.as_deref() == Some(kid) {
        if clock.now_unix() > secret.accept_prev_until {
            return Err(AuthError::PrevKeyExpired);
        }
        secret
            .prev_token_bytes
            .clone()
            .ok_or(AuthError::SignatureMismatch)?
    } else {
        return Err(AuthError::InvalidKid);
    };

    let key = derive_instance_key(KeyScope::Client, &token_bytes, instance_id);
    let message = instance_canonical_message(method, path_with_query, ts, nonce, body);
    hmac_verify(&key, &message, signature).map_err(|_| AuthError::SignatureMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::{SystemClock, sign};
    use ledger_secrets::{InMemorySecretBackend, SecretRecord};
    use ledger_store::Database;

    async fn setup(prev: bool) -> (SecretStore<InMemorySecretBackend>, NonceStore) {
        let backend = InMemorySecretBackend::new();
        backend.insert(
            "ref-billing",
            SecretRecord {
                kid: "v2".to_string(),
                token: "current-secret".to_string(),
                prev_kid: if prev { Some("v1".to_string()) } else { None },
                prev_token: if prev { Some("old-secret".to_string()) } else { None },
            },
        );
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path().join("l.db").to_str().unwrap())
            .await
            .unwrap();
        std::mem::forget(dir);
        (SecretStore::new(backend), NonceStore::new(db))
    }

    fn client_sig(token: &[u8], instance_id: &str, method: &str, path: &str, ts: i64, nonce: &str, body: &[u8]) -> String {
        let key = derive_instance_key(KeyScope::Client, token, instance_id);
        sign(&key, &instance_canonical_message(method, path, ts, nonce, body))
    }

    #[tokio::test]
    async fn current_key_verifies() {
        let (secrets, nonces) = setup(false).await;
        let clock = SystemClock;
        let ts = clock.now_unix();
        let sig = client_sig(b"current-secret", "inst-1", "POST", "/v1/x", ts, "n1", b"{}");

        let result = verify_instance(
            &clock, &secrets, &nonces, 300, "ref-billing", 300, "inst-1", "POST", "/v1/x",
            Some(&ts.to_string()), Some("n1"), Some("v2"), Some(&sig), b"{}",
        )
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn previous_key_verifies_within_grace_window() {
        let (secrets, nonces) = setup(true).await;
        let clock = SystemClock;
        let ts = clock.now_unix();
        let sig = client_sig(b"old-secret", "inst-1", "POST", "/v1/x", ts, "n2", b"{}");

        let result = verify_instance(
            &clock, &secrets, &nonces, 300, "ref-billing", 300, "inst-1", "POST", "/v1/x",
            Some(&ts.to_string()), Some("n2"), Some("v1"), Some(&sig), b"{}",
        )
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn expired_previous_key_is_rejected_distinctly() {
        let (secrets, nonces) = setup(true).await;
        let clock = SystemClock;
        let ts = clock.now_unix();
        let sig = client_sig(b"old-secret", "inst-1", "POST", "/v1/x", ts, "n2b", b"{}");

        // secret_ttl_s = -1 backdates accept_prev_until before `now`.
        let result = verify_instance(
            &clock, &secrets, &nonces, 300, "ref-billing", -1, "inst-1", "POST", "/v1/x",
            Some(&ts.to_string()), Some("n2b"), Some("v1"), Some(&sig), b"{}",
        )
        .await;

        assert_eq!(result, Err(AuthError::PrevKeyExpired));
    }

    #[tokio::test]
    async fn unknown_kid_is_rejected() {
        let (secrets, nonces) = setup(false).await;
        let clock = SystemClock;
        let ts = clock.now_unix();
        let sig = client_sig(b"current-secret", "inst-1", "POST", "/v1/x", ts, "n3", b"{}");

        let result = verify_instance(
            &clock, &secrets, &nonces, 300, "ref-billing", 300, "inst-1", "POST", "/v1/x",
            Some(&ts.to_string()), Some("n3"), Some("v9"), Some(&sig), b"{}",
        )
        .await;

        assert_eq!(result, Err(AuthError::InvalidKid));
    }

    #[tokio::test]
    async fn missing_kid_is_rejected() {
        let (secrets, nonces) = setup(false).await;
        let clock = SystemClock;
        let ts = clock.now_unix();

        let result = verify_instance(
            &clock, &secrets, &nonces, 300, "ref-billing", 300, "inst-1", "POST", "/v1/x",
            Some(&ts.to_string()), Some("n4"), None, Some("sha256=00"), b"{}",
        )
        .await;

        assert_eq!(result, Err(AuthError::InvalidKid));
    }

    #[tokio::test]
    async fn replayed_nonce_is_rejected() {
        let (secrets, nonces) = setup(false).await;
        let clock = SystemClock;
        let ts = clock.now_unix();
        let sig = client_sig(b"current-secret", "inst-1", "POST", "/v1/x", ts, "n5", b"{}");

        verify_instance(
            &clock, &secrets, &nonces, 300, "ref-billing", 300, "inst-1", "POST", "/v1/x",
            Some(&ts.to_string()), Some("n5"), Some("v2"), Some(&sig), b"{}",
        )
        .await
        .unwrap();

        let second = verify_instance(
            &clock, &secrets, &nonces, 300, "ref-billing", 300, "inst-1", "POST", "/v1/x",
            Some(&ts.to_string()), Some("n5"), Some("v2"), Some(&sig), b"{}",
        )
        .await;

        assert_eq!(second, Err(AuthError::SignatureMismatch));
    }
}
