use std::sync::Arc;

use iap_backend::{BackendSignal, BillingBackend};
use iap_catalog::ProductRegistry;
use iap_config::BillingConfig;
use iap_reconcile::{EngineSettings, EventSink, NullSink, ReconcileEngine};
use iap_schemas::{BillingError, ProductCategory, ProductId};
use iap_signature::{RsaPkcs1Verifier, SignatureVerifier, TrustKey};
use tokio::sync::mpsc;

use crate::{BillingClient, ReconnectPolicy};

/// Configures a [`BillingClient`].
///
/// Defaults: no products, auto-acknowledge and auto-consume on, RSA
/// PKCS#1 v1.5 verifier, empty trust key, no-op sink, unbounded backoff.
pub struct BillingClientBuilder {
    lists: Vec<(ProductCategory, Vec<ProductId>)>,
    settings: EngineSettings,
    trust_key: TrustKey,
    verifier: Arc<dyn SignatureVerifier>,
    sink: Arc<dyn EventSink>,
    policy: ReconnectPolicy,
}

impl Default for BillingClientBuilder {
    fn default() -> Self {
        Self {
            lists: Vec::new(),
            settings: EngineSettings::default(),
            trust_key: TrustKey::new(""),
            verifier: Arc::new(RsaPkcs1Verifier::new()),
            sink: Arc::new(NullSink),
            policy: ReconnectPolicy::default(),
        }
    }
}

impl BillingClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Product lists, toggles and reconnect policy from a loaded config.
    /// The trust key is resolved separately (see `iap_config::resolve_trust_key`).
    pub fn from_config(cfg: &BillingConfig) -> Self {
        let mut b = Self::new()
            .auto_acknowledge(cfg.billing.auto_acknowledge)
            .auto_consume(cfg.billing.auto_consume)
            .reconnect_policy(ReconnectPolicy::from_config(&cfg.reconnect));
        for (category, ids) in cfg.products.by_category() {
            if !ids.is_empty() {
                b = b.register(category, ids);
            }
        }
        b
    }

    /// Queue `ids` for registration under `category`. Overlaps are reported
    /// by [`build`](Self::build).
    pub fn register<I, S>(mut self, category: ProductCategory, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ProductId>,
    {
        self.lists
            .push((category, ids.into_iter().map(Into::into).collect()));
        self
    }

    pub fn consumables<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ProductId>,
    {
        self.register(ProductCategory::Consumable, ids)
    }

    pub fn non_consumables<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ProductId>,
    {
        self.register(ProductCategory::NonConsumable, ids)
    }

    pub fn subscriptions<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ProductId>,
    {
        self.register(ProductCategory::Subscription, ids)
    }

    pub fn auto_acknowledge(mut self, on: bool) -> Self {
        self.settings.auto_acknowledge = on;
        self
    }

    pub fn auto_consume(mut self, on: bool) -> Self {
        self.settings.auto_consume = on;
        self
    }

    pub fn trust_key(mut self, key: TrustKey) -> Self {
        self.trust_key = key;
        self
    }

    pub fn verifier<V: SignatureVerifier + 'static>(mut self, verifier: V) -> Self {
        self.verifier = Arc::new(verifier);
        self
    }

    pub fn sink<S: EventSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn shared_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// # Errors
    /// [`BillingError::Configuration`] when an id is registered under two
    /// categories or is blank.
    pub fn build<B: BillingBackend>(
        self,
        backend: B,
        signals: mpsc::UnboundedReceiver<BackendSignal>,
    ) -> Result<BillingClient<B>, BillingError> {
        let mut registry = ProductRegistry::new();
        for (category, ids) in self.lists {
            registry.register(category, ids)?;
        }
        if self.trust_key.is_empty() {
            tracing::warn!("no trust key configured: every purchase will fail signature checks");
        }
        let engine = ReconcileEngine::new(self.verifier, self.trust_key, self.settings);
        Ok(BillingClient::new(
            backend,
            signals,
            registry,
            engine,
            self.sink,
            self.policy,
        ))
    }
}
