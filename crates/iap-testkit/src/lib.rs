//! Shared wiring for end-to-end scenarios: a fake store with a fixed
//! product set, a client bound to it, and the event stream.

use anyhow::{Context, Result};
use iap_backend_fake::{DigestVerifier, FakeBackend};
use iap_client::{BillingClient, BillingClientBuilder, BillingEvent, ProductCategory, ReconnectPolicy};
use iap_config::{load_layered_yaml_from_strings, secrets::resolve_trust_key_with};
use iap_signature::TrustKey;
use serde_json::json;
use tokio::sync::mpsc;

pub const TRUST_KEY: &str = "testkit-trust-key";
pub const TRUST_KEY_ENV: &str = "IAP_TESTKIT_TRUST_KEY";

/// Products the fake store knows about.
pub const STORE: &[(&str, ProductCategory)] = &[
    ("coin_100", ProductCategory::Consumable),
    ("coin_500", ProductCategory::Consumable),
    ("remove_ads", ProductCategory::NonConsumable),
    ("vip_monthly", ProductCategory::Subscription),
    // Sold by the store, never registered by the app.
    ("stranger", ProductCategory::Consumable),
];

pub struct Harness {
    pub client: BillingClient<FakeBackend>,
    /// Second handle on the client's backend, for scripting and call inspection.
    pub store: FakeBackend,
    pub events: mpsc::UnboundedReceiver<BillingEvent>,
}

/// Fake store stocked with [`STORE`].
pub fn stocked_store() -> (FakeBackend, mpsc::UnboundedReceiver<iap_client::BackendSignal>) {
    let (store, signals) = FakeBackend::new(TRUST_KEY);
    for (id, category) in STORE {
        store.add_product(*id, *category, json!({ "title": id, "price": "0.99" }));
    }
    (store, signals)
}

impl Harness {
    /// Bind `builder` to a stocked store. Verifier, trust key, sink and
    /// reconnect policy are overridden for determinism.
    pub fn new(builder: BillingClientBuilder) -> Result<Self> {
        let (store, signals) = stocked_store();
        Self::with_store(builder, store, signals)
    }

    pub fn with_store(
        builder: BillingClientBuilder,
        store: FakeBackend,
        signals: mpsc::UnboundedReceiver<iap_client::BackendSignal>,
    ) -> Result<Self> {
        let (tx, events) = mpsc::unbounded_channel();
        let client = builder
            .verifier(DigestVerifier)
            .trust_key(TrustKey::new(TRUST_KEY))
            .sink(tx)
            .reconnect_policy(ReconnectPolicy::immediate())
            .build(store.clone(), signals)
            .context("build billing client")?;
        Ok(Self {
            client,
            store,
            events,
        })
    }

    /// coin_100 (consumable) and remove_ads (non-consumable), auto-acknowledge on.
    pub fn coins_and_ads() -> Result<Self> {
        Self::new(
            BillingClientBuilder::new()
                .consumables(["coin_100"])
                .non_consumables(["remove_ads"])
                .auto_acknowledge(true),
        )
    }

    /// Client configured from layered YAML, trust key resolved from
    /// [`TRUST_KEY_ENV`] through a fixed lookup.
    pub fn from_yaml(layers: &[&str]) -> Result<Self> {
        let loaded = load_layered_yaml_from_strings(layers)?;
        let key = resolve_trust_key_with(&loaded.billing, |name| {
            (name == TRUST_KEY_ENV).then(|| TRUST_KEY.to_string())
        })?;
        let (store, signals) = stocked_store();
        let (tx, events) = mpsc::unbounded_channel();
        let client = BillingClientBuilder::from_config(&loaded.billing)
            .verifier(DigestVerifier)
            .trust_key(key)
            .sink(tx)
            .build(store.clone(), signals)
            .context("build billing client from config")?;
        Ok(Self {
            client,
            store,
            events,
        })
    }

    /// Every event emitted so far.
    pub fn drain(&mut self) -> Vec<BillingEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = self.events.try_recv() {
            out.push(ev);
        }
        out
    }
}

pub fn names(events: &[BillingEvent]) -> Vec<&'static str> {
    events.iter().map(BillingEvent::name).collect()
}
