//! iap-signature
//!
//! Signature Validator boundary: `verify(trust_key, payload, signature) -> bool`.
//!
//! Receipt validation is a pure function. The reconciliation engine only sees
//! the [`SignatureVerifier`] trait; [`RsaPkcs1Verifier`] is the production
//! implementation, tests plug in closures or digest-based fakes.

mod key;
mod rsa_pkcs1;

pub use key::TrustKey;
pub use rsa_pkcs1::RsaPkcs1Verifier;

/// Verifies a purchase receipt against the configured trust key.
///
/// Implementations must be pure: same inputs, same answer, no IO.
/// Any decoding problem is a failed verification, never a panic.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, trust_key: &TrustKey, payload: &str, signature: &str) -> bool;
}

impl<F> SignatureVerifier for F
where
    F: Fn(&TrustKey, &str, &str) -> bool + Send + Sync,
{
    fn verify(&self, trust_key: &TrustKey, payload: &str, signature: &str) -> bool {
        self(trust_key, payload, signature)
    }
}
