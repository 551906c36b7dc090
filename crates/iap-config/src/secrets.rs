//! Trust key resolution.
//!
//! Config YAML stores only the env var NAME (`signature.trust_key_env`).
//! The key is read once at startup and handed to the client builder.
//! Error messages reference the NAME, never the value.

use anyhow::{bail, Result};
use iap_signature::TrustKey;

use crate::BillingConfig;

/// Read the trust key from the environment variable named in `cfg`.
pub fn resolve_trust_key(cfg: &BillingConfig) -> Result<TrustKey> {
    resolve_trust_key_with(cfg, |name| std::env::var(name).ok())
}

/// Same as [`resolve_trust_key`] with an explicit lookup.
pub fn resolve_trust_key_with<F>(cfg: &BillingConfig, lookup: F) -> Result<TrustKey>
where
    F: Fn(&str) -> Option<String>,
{
    let var = cfg.signature.trust_key_env.trim();
    match lookup(var) {
        Some(v) if !v.trim().is_empty() => Ok(TrustKey::new(v)),
        _ => bail!("SECRETS_MISSING: required env var '{var}' (trust key) is not set or empty"),
    }
}
