use std::fmt;

/// Public key that purchase signatures are checked against (base64 DER,
/// SubjectPublicKeyInfo for the RSA verifier).
///
/// **Value is redacted in `Debug` output.**
#[derive(Clone, PartialEq, Eq)]
pub struct TrustKey(String);

impl TrustKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().trim().to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for TrustKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TrustKey").field(&"<REDACTED>").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_key() {
        let key = TrustKey::new("MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEA");
        let dbg = format!("{key:?}");
        assert!(!dbg.contains("MIIB"));
        assert!(dbg.contains("REDACTED"));
    }

    #[test]
    fn surrounding_whitespace_trimmed() {
        assert_eq!(TrustKey::new("  abc\n").expose(), "abc");
    }
}
