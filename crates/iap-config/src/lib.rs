//! iap-config
//!
//! Layered YAML configuration for the billing client.
//!
//! Pipeline, identical for every consumer:
//! 1. YAML documents merged in order (later layers override earlier ones);
//! 2. converted to JSON;
//! 3. rejected if any leaf string looks like a secret literal;
//! 4. hashed (SHA-256 of canonical JSON, hex);
//! 5. decoded into the typed [`BillingConfig`] (unknown keys rejected).

use std::fs;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};

mod billing;
pub mod secrets;

pub use billing::{BillingConfig, BillingToggles, ProductsConfig, ReconnectConfig, SignatureConfig};
pub use secrets::resolve_trust_key;

/// If any leaf string value starts with one of these, loading aborts with
/// CONFIG_SECRET_DETECTED. The config holds env var names, never key material.
const SECRET_PREFIXES: &[&str] = &[
    "-----BEGIN", // PEM keys
    "MIIB",       // base64 DER public/private keys
    "MIIC",
    "MIIE",
    "sk-",
    "sk_live",
    "sk_test",
    "AKIA",
    "ghp_",
    "glpat-",
];

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
    pub billing: BillingConfig,
}

pub fn load_layered_yaml<P: AsRef<str>>(paths: &[P]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let p = p.as_ref();
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    if yaml_docs.is_empty() {
        bail!("CONFIG_EMPTY: at least one yaml layer is required");
    }

    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }
    // An empty document decodes to null; treat as an empty mapping.
    if merged.is_null() {
        merged = serde_json::json!({});
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    let billing: BillingConfig = serde_json::from_value(merged.clone())
        .context("CONFIG_INVALID: billing config does not match schema")?;
    billing.validate()?;

    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
        billing,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        // An empty overlay document must not wipe the base.
        (a, Value::Null) => a,
        (_, b_other) => b_other,
    }
}

/// serde_json's default map is key-ordered, so plain serialization is canonical.
fn canonicalize_json(v: &Value) -> Result<String> {
    serde_json::to_string(v).context("canonical json serialize failed")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn collect_leaf_strings<'a>(v: &'a Value, prefix: &str, out: &mut Vec<(String, &'a str)>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map {
                let next = format!("{}/{}", prefix, k.replace('~', "~0").replace('/', "~1"));
                collect_leaf_strings(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                collect_leaf_strings(vv, &format!("{prefix}/{i}"), out);
            }
        }
        Value::String(s) => out.push((prefix.to_string(), s.as_str())),
        _ => {}
    }
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaf_strings(v, "", &mut leaves);

    for (ptr, s) in leaves {
        if looks_like_secret(s) {
            bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}
