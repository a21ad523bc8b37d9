//! Cached access to each service's bootstrap secret and its current/previous
//! signing key, modeled on the key-cache-in-front-of-a-slow-backend pattern
//! used elsewhere in this stack for asymmetric key material, adapted here
//! for the ledger's symmetric per-service tokens.

mod backend;
mod cache;

pub use backend::{InMemorySecretBackend, SecretBackend, SecretRecord};
pub use cache::{CachedSecret, SecretStore};
