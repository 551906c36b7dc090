use anyhow::{Context, Result};
use iap_catalog::ProductRegistry;
use iap_config::{load_layered_yaml, resolve_trust_key, BillingConfig};
use serde_json::json;

/// Register every configured list the way the client does, so overlaps and
/// empty sets fail here rather than at connect.
pub fn registry_from_config(cfg: &BillingConfig) -> Result<ProductRegistry> {
    let mut registry = ProductRegistry::new();
    for (category, ids) in cfg.products.by_category() {
        registry
            .register(category, ids)
            .with_context(|| format!("invalid {category} product list"))?;
    }
    registry.seal().context("invalid product registration")?;
    Ok(registry)
}

pub fn check(paths: &[String]) -> Result<()> {
    let loaded = load_layered_yaml(paths)?;
    let cfg = &loaded.billing;
    let registry = registry_from_config(cfg)?;

    let partitions: serde_json::Map<String, serde_json::Value> = registry
        .partitions()
        .into_iter()
        .map(|(category, ids)| (category.as_str().to_string(), json!(ids)))
        .collect();

    let summary = json!({
        "config_hash": loaded.config_hash,
        "products": partitions,
        "auto_acknowledge": cfg.billing.auto_acknowledge,
        "auto_consume": cfg.billing.auto_consume,
        "trust_key_env": cfg.signature.trust_key_env,
        "trust_key_present": resolve_trust_key(cfg).is_ok(),
        "reconnect": cfg.reconnect,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

pub fn hash(paths: &[String]) -> Result<()> {
    let loaded = load_layered_yaml(paths)?;
    println!("config_hash={}", loaded.config_hash);
    println!("{}", loaded.canonical_json);
    Ok(())
}
