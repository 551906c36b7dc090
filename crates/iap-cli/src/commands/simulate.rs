use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use iap_backend_fake::{DigestVerifier, FakeBackend};
use iap_client::{BillingClientBuilder, BillingEvent};
use iap_config::{load_layered_yaml, resolve_trust_key};
use iap_signature::TrustKey;
use serde_json::json;
use tokio::sync::mpsc;

use super::config::registry_from_config;

/// Key the in-memory store signs with when the configured env var is unset.
const FALLBACK_KEY: &str = "iap-simulate";

pub struct SimulateArgs {
    pub config_paths: Vec<String>,
    pub own: Vec<String>,
    pub buy: Vec<String>,
    pub disconnect: bool,
}

fn emit(events: &mut mpsc::UnboundedReceiver<BillingEvent>) -> Result<()> {
    while let Ok(ev) = events.try_recv() {
        println!("{}", serde_json::to_string(&ev)?);
    }
    Ok(())
}

pub async fn run(args: SimulateArgs) -> Result<()> {
    let loaded = load_layered_yaml(&args.config_paths)?;
    let cfg = &loaded.billing;
    let registry = registry_from_config(cfg)?;
    tracing::info!(config_hash = %loaded.config_hash, "simulating billing session");

    let key = match resolve_trust_key(cfg) {
        Ok(key) => key,
        Err(_) => {
            tracing::info!(
                var = %cfg.signature.trust_key_env,
                "trust key env var unset; simulating with a throwaway key"
            );
            TrustKey::new(FALLBACK_KEY)
        }
    };

    let (store, signals) = FakeBackend::new(key.expose());
    for (category, ids) in registry.partitions() {
        for id in ids {
            let details = json!({ "title": id.as_str() });
            store.add_product(id, category, details);
        }
    }
    for id in &args.own {
        let Ok(category) = registry.classify(id) else {
            bail!("--own {id}: product is not registered in the config");
        };
        store.seed_owned(id.as_str(), category);
    }

    let (tx, mut events) = mpsc::unbounded_channel();
    let mut client = BillingClientBuilder::from_config(cfg)
        .verifier(DigestVerifier)
        .trust_key(key)
        .sink(tx)
        .build(store.clone(), signals)
        .context("build billing client")?;

    client.connect().await.context("connect")?;
    emit(&mut events)?;

    for id in &args.buy {
        client
            .launch_purchase(id)
            .await
            .with_context(|| format!("buy {id}"))?;
        client.process_pending_signals().await;
        emit(&mut events)?;
    }

    if args.disconnect {
        store.disconnect();
        client.process_pending_signals().await;
        emit(&mut events)?;
    }

    let ownership: BTreeMap<String, _> = registry
        .all_ids()
        .into_iter()
        .map(|id| {
            let answer = client.is_purchased(id.as_str());
            (id.as_str().to_string(), answer)
        })
        .collect();
    let summary = json!({
        "event": "summary",
        "session": client.session_state(),
        "ready": client.is_ready(),
        "is_purchased": ownership,
        "ledger": client
            .purchased_products()
            .iter()
            .map(|r| json!({ "product_id": r.product_id(), "acknowledged": r.acknowledged }))
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string(&summary)?);

    client.release().await;
    Ok(())
}
