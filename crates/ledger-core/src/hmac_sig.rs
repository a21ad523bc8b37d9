use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature does not have the expected sha256=<hex> shape")]
    MalformedHeader,
    #[error("signature does not match")]
    Mismatch,
}

/// Signs `message` with `key` and returns the header value in
/// `sha256=<lowercase-hex>` form.
pub fn sign(key: &[u8], message: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts a key of any length");
    mac.update(message);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Verifies `signature` (a `sha256=<hex>` header value, case-insensitive on
/// the prefix) against `message` under `key`, in constant time.
pub fn verify(key: &[u8], message: &[u8], signature: &str) -> Result<(), SignatureError> {
    let hex_part = signature
        .get(..7)
        .filter(|prefix| prefix.eq_ignore_ascii_case("sha256="))
        .map(|_| &signature[7..])
        .ok_or(SignatureError::MalformedHeader)?;

    let provided = hex::decode(hex_part).map_err(|_| SignatureError::MalformedHeader)?;

    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts a key of any length");
    mac.update(message);
    let expected = mac.finalize().into_bytes();

    if expected.len() == provided.len() && bool::from(expected.ct_eq(&provided)) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}
