use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

/// Decodes a shared-secret token string into raw bytes.
///
/// A `"base64:"`-prefixed token is base64-decoded; any other token is taken
/// as its own UTF-8 bytes. This matches how bootstrap secrets and
/// per-service tokens are stored in the secret backend.
pub fn token_to_bytes(token: &str) -> Result<Vec<u8>, base64::DecodeError> {
    match token.strip_prefix("base64:") {
        Some(encoded) => BASE64_STANDARD.decode(encoded),
        None => Ok(token.as_bytes().to_vec()),
    }
}
