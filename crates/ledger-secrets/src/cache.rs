use crate::backend::{SecretBackend, SecretRecord};
use ledger_core::{Clock, SystemClock, token_to_bytes};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;
use tracing::debug;

/// The cached, decoded form of a [`SecretRecord`], stamped with when it was
/// fetched and how long the previous key should still be honored.
#[derive(Clone)]
pub struct CachedSecret {
    pub kid: String,
    pub token_bytes: Arc<Vec<u8>>,
    pub prev_kid: Option<String>,
    pub prev_token_bytes: Option<Arc<Vec<u8>>>,
    pub rotated_at: i64,
    pub accept_prev_until: i64,
}

struct Entry {
    secret: CachedSecret,
    fetched_at: i64,
}

/// Per-service TTL cache in front of a [`SecretBackend`].
///
/// Caching is keyed by `bootstrap_secret_ref` and is process-local: there is
/// no cross-process invalidation. Correctness under rotation relies on the
/// cache TTL plus the `accept_prev_until` grace window recorded on each
/// entry, exactly as the backing secret manager intends.
pub struct SecretStore<B: SecretBackend> {
    backend: B,
    clock: Arc<dyn Clock>,
    cache: RwLock<HashMap<String, Entry>>,
}

impl<B: SecretBackend> SecretStore<B> {
    pub fn new(backend: B) -> Self {
        Self::with_clock(backend, Arc::new(SystemClock))
    }

    pub fn with_clock(backend: B, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached or freshly-fetched secret for `bootstrap_secret_ref`,
    /// re-fetching once `ttl_s` seconds have elapsed since the last fetch.
    pub async fn get(
        &self,
        bootstrap_secret_ref: &str,
        ttl_s: i64,
    ) -> Result<Option<CachedSecret>, String> {
        let now = self.clock.now_unix();

        if let Some(entry) = self
            .cache
            .read()
            .expect("secret cache lock poisoned")
            .get(bootstrap_secret_ref)
        {
            if now - entry.fetched_at < ttl_s {
                return Ok(Some(entry.secret.clone()));
            }
        }

        debug!(bootstrap_secret_ref, "secret cache miss, fetching from backend");
        let record = match self.backend.fetch(bootstrap_secret_ref).await? {
            Some(record) => record,
            None => return Ok(None),
        };

        let secret = decode(record, now, ttl_s)?;
        self.cache
            .write()
            .expect("secret cache lock poisoned")
            .insert(
                bootstrap_secret_ref.to_string(),
                Entry {
                    secret: secret.clone(),
                    fetched_at: now,
                },
            );

        Ok(Some(secret))
    }

    pub async fn get_current(
        &self,
        bootstrap_secret_ref: &str,
        ttl_s: i64,
    ) -> Result<Option<(String, Arc<Vec<u8>>)>, String> {
        Ok(self
            .get(bootstrap_secret_ref, ttl_s)
            .await?
            .map(|s| (s.kid, s.token_bytes)))
    }

    pub async fn get_previous(
        &self,
        bootstrap_secret_ref: &str,
        ttl_s: i64,
    ) -> Result<Option<(String, Arc<Vec<u8>>)>, String> {
        Ok(self
            .get(bootstrap_secret_ref, ttl_s)
            .await?
            .and_then(|s| s.prev_kid.zip(s.prev_token_bytes)))
    }
}

fn decode(record: SecretRecord, now: i64, ttl_s: i64) -> Result<CachedSecret, String> {
    let token_bytes = token_to_bytes(&record.token).map_err(|e| e.to_string())?;
    let prev_token_bytes = record
        .prev_token
        .as_deref()
        .map(token_to_bytes)
        .transpose()
        .map_err(|e| e.to_string())?;

    Ok(CachedSecret {
        kid: record.kid,
        token_bytes: Arc::new(token_bytes),
        prev_kid: record.prev_kid,
        prev_token_bytes: prev_token_bytes.map(Arc::new),
        rotated_at: now,
        accept_prev_until: now + ttl_s,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemorySecretBackend;

    fn record() -> SecretRecord {
        SecretRecord {
            kid: "v2".to_string(),
            token: "base64:aGVsbG8=".to_string(),
            prev_kid: Some("v1".to_string()),
            prev_token: Some("old-secret".to_string()),
        }
    }

    #[tokio::test]
    async fn fetches_and_decodes_current_and_previous() {
        let backend = InMemorySecretBackend::new();
        backend.insert("svc-ref", record());
        let store = SecretStore::new(backend);

        let (kid, token) = store.get_current("svc-ref", 300).await.unwrap().unwrap();
        assert_eq!(kid, "v2");
        assert_eq!(*token, b"hello".to_vec());

        let (prev_kid, prev_token) = store.get_previous("svc-ref", 300).await.unwrap().unwrap();
        assert_eq!(prev_kid, "v1");
        assert_eq!(*prev_token, b"old-secret".to_vec());
    }

    #[tokio::test]
    async fn missing_ref_returns_none() {
        let store = SecretStore::new(InMemorySecretBackend::new());
        assert!(store.get_current("nope", 300).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn accept_prev_until_is_stamped_from_ttl() {
        let backend = InMemorySecretBackend::new();
        backend.insert("svc-ref", record());
        let store = SecretStore::new(backend);

        let secret = store.get("svc-ref", 120).await.unwrap().unwrap();
        assert_eq!(secret.accept_prev_until, secret.rotated_at + 120);
    }
}
