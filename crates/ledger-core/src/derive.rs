use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The two purposes a per-instance derived key can be used for. Keeping
/// these distinct prevents a signature intended for one direction of
/// traffic from being replayed as the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope {
    /// Ledger → instance: used to sign fanout pushes.
    Push,
    /// Instance → ledger: used to sign registration and heartbeat calls.
    Client,
}

impl KeyScope {
    fn as_str(self) -> &'static str {
        match self {
            KeyScope::Push => "push",
            KeyScope::Client => "client",
        }
    }
}

/// Derives the per-instance key used to sign/verify requests in the given
/// direction: `HMAC-SHA256(token_bytes, scope + ":" + instance_id)`.
pub fn derive_instance_key(scope: KeyScope, token_bytes: &[u8], instance_id: &str) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(token_bytes).expect("HMAC accepts a key of any length");
    mac.update(scope.as_str().as_bytes());
    mac.update(b":");
    mac.update(instance_id.as_bytes());
    mac.finalize().into_bytes().to_vec()
}
