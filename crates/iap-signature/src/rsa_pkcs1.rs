use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::Sha256;

use crate::{SignatureVerifier, TrustKey};

/// RSASSA-PKCS1-v1_5 over SHA-256.
///
/// - trust key: base64 DER `SubjectPublicKeyInfo`
/// - signature: base64 of the raw signature bytes
/// - payload: verified byte-for-byte as received
#[derive(Clone, Copy, Debug, Default)]
pub struct RsaPkcs1Verifier;

impl RsaPkcs1Verifier {
    pub fn new() -> Self {
        Self
    }
}

impl SignatureVerifier for RsaPkcs1Verifier {
    fn verify(&self, trust_key: &TrustKey, payload: &str, signature: &str) -> bool {
        if trust_key.is_empty() || payload.is_empty() || signature.trim().is_empty() {
            tracing::debug!("signature check refused: empty key, payload or signature");
            return false;
        }

        let Ok(key_der) = STANDARD.decode(trust_key.expose()) else {
            tracing::warn!("trust key is not valid base64");
            return false;
        };
        let Ok(public_key) = RsaPublicKey::from_public_key_der(&key_der) else {
            tracing::warn!("trust key is not an RSA SubjectPublicKeyInfo");
            return false;
        };
        let Ok(sig_bytes) = STANDARD.decode(signature.trim()) else {
            tracing::debug!("signature is not valid base64");
            return false;
        };
        let Ok(sig) = Signature::try_from(sig_bytes.as_slice()) else {
            return false;
        };

        VerifyingKey::<Sha256>::new(public_key)
            .verify(payload.as_bytes(), &sig)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1v15::SigningKey;
    use rsa::pkcs8::EncodePublicKey;
    use rsa::signature::{SignatureEncoding, Signer};
    use rsa::RsaPrivateKey;

    struct Fixture {
        key: TrustKey,
        signing: SigningKey<Sha256>,
    }

    fn fixture() -> Fixture {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let der = private.to_public_key().to_public_key_der().unwrap();
        Fixture {
            key: TrustKey::new(STANDARD.encode(der.as_bytes())),
            signing: SigningKey::<Sha256>::new(private),
        }
    }

    fn sign(fx: &Fixture, payload: &str) -> String {
        STANDARD.encode(fx.signing.sign(payload.as_bytes()).to_bytes())
    }

    // One key generation for the whole matrix; RSA keygen is slow in debug.
    #[test]
    fn verifies_genuine_and_rejects_forged_receipts() {
        let fx = fixture();
        let v = RsaPkcs1Verifier::new();
        let payload = r#"{"productId":"remove_ads","purchaseToken":"tok-1"}"#;
        let sig = sign(&fx, payload);

        assert!(v.verify(&fx.key, payload, &sig), "genuine receipt");

        let tampered = payload.replace("remove_ads", "coin_100");
        assert!(!v.verify(&fx.key, &tampered, &sig), "tampered payload");

        let other_sig = sign(&fx, "something else");
        assert!(!v.verify(&fx.key, payload, &other_sig), "signature of other payload");

        assert!(!v.verify(&fx.key, payload, "not base64 !!"), "garbage signature");
        assert!(!v.verify(&fx.key, payload, ""), "empty signature");
        assert!(!v.verify(&TrustKey::new("AAAA"), payload, &sig), "garbage key");
        assert!(!v.verify(&TrustKey::new(""), payload, &sig), "empty key");
    }
}
