//! Callback signing and verification.
//!
//! Gateways sign the raw callback body with HMAC-SHA256 over a shared
//! secret; the webhook layer verifies before handing the outcome to the
//! coordinator. Comparison is constant-time.

use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Signs a callback payload using HMAC-SHA256.
pub fn sign_callback(payload: &[u8], secret: &str) -> String {
    use hmac::{Hmac, Mac};

    type HmacSha256 = Hmac<Sha256>;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a callback signature using constant-time comparison.
pub fn verify_callback_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
    let expected = sign_callback(payload, secret);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_signing_roundtrip() {
        let payload = br#"{"reference":"mm_1","outcome":"approved"}"#;
        let secret = "gateway_secret_123";

        let signature = sign_callback(payload, secret);
        assert!(verify_callback_signature(payload, &signature, secret));
        assert!(!verify_callback_signature(payload, &signature, "wrong_secret"));
        assert!(!verify_callback_signature(b"tampered", &signature, secret));
    }
}
