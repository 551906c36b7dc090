use iap_signature::{SignatureVerifier, TrustKey};
use sha2::{Digest, Sha256};

/// `hex(sha256(key || payload))`. Not a real signature scheme; it only lets
/// tests produce receipts that verify against one key and fail against another.
pub fn sign_payload(key: &str, payload: &str) -> String {
    let mut h = Sha256::new();
    h.update(key.as_bytes());
    h.update(payload.as_bytes());
    hex::encode(h.finalize())
}

/// Verifier matching [`sign_payload`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DigestVerifier;

impl SignatureVerifier for DigestVerifier {
    fn verify(&self, trust_key: &TrustKey, payload: &str, signature: &str) -> bool {
        !trust_key.is_empty() && sign_payload(trust_key.expose(), payload) == signature
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_key_fails() {
        let sig = sign_payload("k1", "payload");
        assert!(DigestVerifier.verify(&TrustKey::new("k1"), "payload", &sig));
        assert!(!DigestVerifier.verify(&TrustKey::new("k2"), "payload", &sig));
        assert!(!DigestVerifier.verify(&TrustKey::new(""), "payload", &sign_payload("", "payload")));
    }
}
