//! Webhook signature schemes.
//!
//! Each verifier decodes the presented signature and checks it with
//! `Mac::verify_slice`, which compares in constant time.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};

use crate::GatewayError;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// HMAC-SHA256 over `data`, returned as lowercase hex.
pub fn hmac_sha256_hex(secret: &[u8], data: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// HMAC-SHA512 over `data`, returned as lowercase hex.
pub fn hmac_sha512_hex(secret: &[u8], data: &[u8]) -> String {
    let mut mac = HmacSha512::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// HMAC-SHA256 over `data`, base64-encoded (Cashfree's scheme).
pub fn hmac_sha256_base64(secret: &[u8], data: &[u8]) -> String {
    use base64::Engine as _;
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(data);
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Verify a hex-encoded HMAC-SHA256 signature in constant time.
pub fn verify_sha256_hex(secret: &[u8], data: &[u8], sig_hex: &str) -> Result<(), GatewayError> {
    let sig = hex::decode(sig_hex.trim()).map_err(|_| GatewayError::SignatureInvalid)?;
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(data);
    mac.verify_slice(&sig).map_err(|_| GatewayError::SignatureInvalid)
}

/// Verify a hex-encoded HMAC-SHA512 signature in constant time.
pub fn verify_sha512_hex(secret: &[u8], data: &[u8], sig_hex: &str) -> Result<(), GatewayError> {
    let sig = hex::decode(sig_hex.trim()).map_err(|_| GatewayError::SignatureInvalid)?;
    let mut mac = HmacSha512::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(data);
    mac.verify_slice(&sig).map_err(|_| GatewayError::SignatureInvalid)
}

/// Verify a base64-encoded HMAC-SHA256 signature in constant time.
pub fn verify_sha256_base64(secret: &[u8], data: &[u8], sig_b64: &str) -> Result<(), GatewayError> {
    use base64::Engine as _;
    let sig = base64::engine::general_purpose::STANDARD
        .decode(sig_b64.trim())
        .map_err(|_| GatewayError::SignatureInvalid)?;
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(data);
    mac.verify_slice(&sig).map_err(|_| GatewayError::SignatureInvalid)
}

/// Re-serialize a JSON payload with lexicographically sorted keys.
///
/// NOWPayments signs the key-sorted form, not the raw bytes.
/// `serde_json::Map` is backed by a `BTreeMap`, so a parse/serialize
/// round trip yields the canonical ordering at every nesting level.
pub fn canonical_sorted_json(raw: &[u8]) -> Result<String, GatewayError> {
    let value: serde_json::Value =
        serde_json::from_slice(raw).map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;
    serde_json::to_string(&value).map_err(|e| GatewayError::MalformedPayload(e.to_string()))
}
