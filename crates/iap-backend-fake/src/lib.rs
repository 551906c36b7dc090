//! Deterministic in-memory purchasing backend.
//!
//! Design decisions:
//! - purchase tokens are uuid v5 derived from `(product_id, purchase_seq)`;
//! - purchase times are derived from the same sequence number;
//! - receipts are signed with `hex(sha256(key || payload))`, checked by
//!   [`DigestVerifier`];
//! - no randomness, no wall clock.
//!
//! The handle is cheap to clone. Tests keep one clone to script failures and
//! inspect the call log while the client owns the other.

mod digest;
mod types;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use iap_backend::{BackendSignal, BillingBackend, SubscriptionSupport};
use iap_schemas::{
    BackendFailure, CatalogEntry, ProductCategory, ProductId, Purchase, PurchaseState,
    ResponseCode,
};
use tokio::sync::mpsc;
use uuid::Uuid;

pub use digest::{sign_payload, DigestVerifier};
pub use types::BackendCall;

/// First purchase time handed out; each purchase adds one second.
const EPOCH_SECS: i64 = 1_700_000_000;

#[derive(Debug)]
struct OwnedPurchase {
    category: ProductCategory,
    purchase: Purchase,
}

#[derive(Debug)]
struct FakeState {
    signing_key: String,
    connected: bool,
    /// product_id -> (category, details)
    products: BTreeMap<ProductId, (ProductCategory, serde_json::Value)>,
    /// purchase_token -> purchase
    owned: BTreeMap<String, OwnedPurchase>,
    purchase_seq: u64,

    connect_failures: VecDeque<BackendFailure>,
    catalog_failures: HashMap<ProductCategory, BackendFailure>,
    owned_failures: HashMap<ProductCategory, BackendFailure>,
    consume_failure: Option<BackendFailure>,
    acknowledge_failure: Option<BackendFailure>,
    flow_failure: Option<BackendFailure>,
    pending_next_flow: bool,
    tamper_next_signature: bool,
    subscription_support: SubscriptionSupport,

    calls: Vec<BackendCall>,
}

/// In-memory backend implementing [`BillingBackend`].
#[derive(Clone, Debug)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
    signals: mpsc::UnboundedSender<BackendSignal>,
}

impl FakeBackend {
    /// Create a backend signing receipts with `signing_key`, plus the signal
    /// receiver to hand to the client.
    pub fn new(signing_key: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<BackendSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = FakeState {
            signing_key: signing_key.into(),
            connected: false,
            products: BTreeMap::new(),
            owned: BTreeMap::new(),
            purchase_seq: 0,
            connect_failures: VecDeque::new(),
            catalog_failures: HashMap::new(),
            owned_failures: HashMap::new(),
            consume_failure: None,
            acknowledge_failure: None,
            flow_failure: None,
            pending_next_flow: false,
            tamper_next_signature: false,
            subscription_support: SubscriptionSupport::Supported,
            calls: Vec::new(),
        };
        (
            Self {
                state: Arc::new(Mutex::new(state)),
                signals: tx,
            },
            rx,
        )
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn signal(&self, signal: BackendSignal) {
        if self.signals.send(signal).is_err() {
            tracing::debug!("fake backend signal dropped: receiver closed");
        }
    }

    // -----------------------------------------------------------------------
    // Catalog / ownership setup
    // -----------------------------------------------------------------------

    /// Make `product_id` purchasable.
    pub fn add_product(
        &self,
        product_id: impl Into<ProductId>,
        category: ProductCategory,
        details: serde_json::Value,
    ) {
        self.lock()
            .products
            .insert(product_id.into(), (category, details));
    }

    /// Record an already-owned purchase, as if bought in an earlier session.
    pub fn seed_owned(&self, product_id: impl Into<ProductId>, category: ProductCategory) -> Purchase {
        let mut st = self.lock();
        mint_purchase(&mut st, product_id.into(), category, PurchaseState::Purchased)
    }

    /// Record an owned purchase the backend has already acknowledged.
    pub fn seed_acknowledged(
        &self,
        product_id: impl Into<ProductId>,
        category: ProductCategory,
    ) -> Purchase {
        let mut st = self.lock();
        let mut p = mint_purchase(&mut st, product_id.into(), category, PurchaseState::Purchased);
        p.acknowledged = true;
        if let Some(o) = st.owned.get_mut(&p.purchase_token) {
            o.purchase.acknowledged = true;
        }
        p
    }

    /// Record an owned purchase whose payment is still pending.
    pub fn seed_pending(&self, product_id: impl Into<ProductId>, category: ProductCategory) -> Purchase {
        let mut st = self.lock();
        mint_purchase(&mut st, product_id.into(), category, PurchaseState::Pending)
    }

    /// Deliver a purchase outside any launched flow, e.g. a promo redemption.
    pub fn push_purchase(&self, product_id: impl Into<ProductId>, category: ProductCategory) -> Purchase {
        let p = {
            let mut st = self.lock();
            mint_purchase(&mut st, product_id.into(), category, PurchaseState::Purchased)
        };
        self.signal(BackendSignal::PurchasesUpdated(Ok(vec![p.clone()])));
        p
    }

    /// Complete payment of a pending purchase and push the update.
    pub fn complete_pending(&self, purchase_token: &str) -> Option<Purchase> {
        let p = {
            let mut st = self.lock();
            let owned = st.owned.get_mut(purchase_token)?;
            owned.purchase.state = PurchaseState::Purchased;
            owned.purchase.clone()
        };
        self.signal(BackendSignal::PurchasesUpdated(Ok(vec![p.clone()])));
        Some(p)
    }

    // -----------------------------------------------------------------------
    // Scripted behaviour
    // -----------------------------------------------------------------------

    /// Fail the next `times` connection attempts with `failure`.
    pub fn fail_next_connects(&self, times: usize, failure: BackendFailure) {
        let mut st = self.lock();
        for _ in 0..times {
            st.connect_failures.push_back(failure.clone());
        }
    }

    /// Fail the next catalog query for `category`.
    pub fn fail_catalog(&self, category: ProductCategory, failure: BackendFailure) {
        self.lock().catalog_failures.insert(category, failure);
    }

    /// Fail the next owned-purchases query for `category`.
    pub fn fail_owned_query(&self, category: ProductCategory, failure: BackendFailure) {
        self.lock().owned_failures.insert(category, failure);
    }

    pub fn fail_next_consume(&self, failure: BackendFailure) {
        self.lock().consume_failure = Some(failure);
    }

    pub fn fail_next_acknowledge(&self, failure: BackendFailure) {
        self.lock().acknowledge_failure = Some(failure);
    }

    /// The next launched flow ends with `failure` instead of a purchase.
    pub fn fail_next_flow(&self, failure: BackendFailure) {
        self.lock().flow_failure = Some(failure);
    }

    /// The next launched flow delivers a pending purchase.
    pub fn pending_next_flow(&self) {
        self.lock().pending_next_flow = true;
    }

    /// The next minted purchase carries a signature that does not verify.
    pub fn tamper_next_signature(&self) {
        self.lock().tamper_next_signature = true;
    }

    pub fn set_subscription_support(&self, support: SubscriptionSupport) {
        self.lock().subscription_support = support;
    }

    /// Drop the service connection and notify the client.
    pub fn disconnect(&self) {
        self.lock().connected = false;
        self.signal(BackendSignal::ServiceDisconnected);
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, call: &BackendCall) -> usize {
        self.lock().calls.iter().filter(|c| *c == call).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Purchases still owned (not consumed), sorted by token.
    pub fn owned_purchases(&self) -> Vec<Purchase> {
        self.lock()
            .owned
            .values()
            .map(|o| o.purchase.clone())
            .collect()
    }

    pub fn owned_purchase(&self, purchase_token: &str) -> Option<Purchase> {
        self.lock()
            .owned
            .get(purchase_token)
            .map(|o| o.purchase.clone())
    }
}

fn mint_purchase(
    st: &mut FakeState,
    product_id: ProductId,
    category: ProductCategory,
    state: PurchaseState,
) -> Purchase {
    st.purchase_seq += 1;
    let seq = st.purchase_seq;

    let token = Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("fake:{product_id}:{seq}").as_bytes(),
    )
    .to_string();
    let purchase_time =
        DateTime::<Utc>::from_timestamp(EPOCH_SECS + seq as i64, 0).unwrap_or_default();
    let payload = serde_json::json!({
        "productId": product_id.as_str(),
        "purchaseToken": token,
        "purchaseTime": purchase_time.timestamp_millis(),
        "purchaseState": state_code(state),
    })
    .to_string();

    let mut signature = sign_payload(&st.signing_key, &payload);
    if std::mem::take(&mut st.tamper_next_signature) {
        signature = sign_payload("tampered", &payload);
    }

    let purchase = Purchase {
        product_id,
        purchase_token: token.clone(),
        original_payload: payload,
        signature,
        state,
        acknowledged: false,
        purchase_time,
    };
    st.owned.insert(
        token,
        OwnedPurchase {
            category,
            purchase: purchase.clone(),
        },
    );
    purchase
}

fn state_code(state: PurchaseState) -> i32 {
    match state {
        PurchaseState::Purchased => 1,
        PurchaseState::Pending => 2,
        PurchaseState::Unspecified => 0,
    }
}

fn not_owned(purchase_token: &str) -> BackendFailure {
    BackendFailure::new(
        ResponseCode::ItemNotOwned,
        format!("no purchase with token {purchase_token}"),
    )
}

#[async_trait]
impl BillingBackend for FakeBackend {
    async fn start_connection(&mut self) -> Result<(), BackendFailure> {
        let mut st = self.lock();
        st.calls.push(BackendCall::StartConnection);
        if let Some(failure) = st.connect_failures.pop_front() {
            return Err(failure);
        }
        st.connected = true;
        Ok(())
    }

    async fn end_connection(&mut self) {
        let mut st = self.lock();
        st.calls.push(BackendCall::EndConnection);
        st.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    async fn query_catalog(
        &mut self,
        category: ProductCategory,
        ids: &[ProductId],
    ) -> Result<Vec<CatalogEntry>, BackendFailure> {
        let mut st = self.lock();
        st.calls.push(BackendCall::QueryCatalog(category));
        if !st.connected {
            return Err(BackendFailure::disconnected());
        }
        if let Some(failure) = st.catalog_failures.remove(&category) {
            return Err(failure);
        }
        Ok(ids
            .iter()
            .filter_map(|id| {
                st.products
                    .get(id)
                    .map(|(c, details)| CatalogEntry::new(id.clone(), *c, details.clone()))
            })
            .collect())
    }

    async fn query_owned_purchases(
        &mut self,
        category: ProductCategory,
    ) -> Result<Vec<Purchase>, BackendFailure> {
        let mut st = self.lock();
        st.calls.push(BackendCall::QueryOwned(category));
        if !st.connected {
            return Err(BackendFailure::disconnected());
        }
        if let Some(failure) = st.owned_failures.remove(&category) {
            return Err(failure);
        }
        Ok(st
            .owned
            .values()
            .filter(|o| o.category == category)
            .map(|o| o.purchase.clone())
            .collect())
    }

    async fn launch_purchase_flow(&mut self, entry: &CatalogEntry) -> Result<(), BackendFailure> {
        let outcome = {
            let mut st = self.lock();
            st.calls
                .push(BackendCall::LaunchFlow(entry.product_id.clone()));
            if !st.connected {
                return Err(BackendFailure::disconnected());
            }

            if let Some(failure) = st.flow_failure.take() {
                Err(failure)
            } else if st
                .owned
                .values()
                .any(|o| o.purchase.product_id == entry.product_id)
            {
                Err(BackendFailure::new(
                    ResponseCode::ItemAlreadyOwned,
                    format!("{} is already owned", entry.product_id),
                ))
            } else {
                let state = if std::mem::take(&mut st.pending_next_flow) {
                    PurchaseState::Pending
                } else {
                    PurchaseState::Purchased
                };
                Ok(vec![mint_purchase(
                    &mut st,
                    entry.product_id.clone(),
                    entry.category,
                    state,
                )])
            }
        };
        self.signal(BackendSignal::PurchasesUpdated(outcome));
        Ok(())
    }

    async fn consume(&mut self, purchase_token: &str) -> Result<(), BackendFailure> {
        let mut st = self.lock();
        st.calls
            .push(BackendCall::Consume(purchase_token.to_string()));
        if !st.connected {
            return Err(BackendFailure::disconnected());
        }
        if let Some(failure) = st.consume_failure.take() {
            return Err(failure);
        }
        match st.owned.remove(purchase_token) {
            Some(_) => Ok(()),
            None => Err(not_owned(purchase_token)),
        }
    }

    async fn acknowledge(&mut self, purchase_token: &str) -> Result<(), BackendFailure> {
        let mut st = self.lock();
        st.calls
            .push(BackendCall::Acknowledge(purchase_token.to_string()));
        if !st.connected {
            return Err(BackendFailure::disconnected());
        }
        if let Some(failure) = st.acknowledge_failure.take() {
            return Err(failure);
        }
        match st.owned.get_mut(purchase_token) {
            Some(o) => {
                o.purchase.acknowledged = true;
                Ok(())
            }
            None => Err(not_owned(purchase_token)),
        }
    }

    async fn subscriptions_supported(&mut self) -> SubscriptionSupport {
        let mut st = self.lock();
        st.calls.push(BackendCall::SubscriptionsSupported);
        if !st.connected {
            return SubscriptionSupport::Disconnected;
        }
        st.subscription_support
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iap_signature::{SignatureVerifier, TrustKey};
    use serde_json::json;

    const KEY: &str = "fake-key";

    #[tokio::test]
    async fn calls_fail_until_connected() {
        let (mut be, _rx) = FakeBackend::new(KEY);
        let err = be
            .query_owned_purchases(ProductCategory::Consumable)
            .await
            .unwrap_err();
        assert!(err.is_disconnect());

        be.start_connection().await.unwrap();
        assert!(be.is_connected());
        assert!(be
            .query_owned_purchases(ProductCategory::Consumable)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn scripted_connect_failures_are_consumed_in_order() {
        let (mut be, _rx) = FakeBackend::new(KEY);
        be.fail_next_connects(2, BackendFailure::new(ResponseCode::ServiceUnavailable, "down"));
        assert!(be.start_connection().await.is_err());
        assert!(be.start_connection().await.is_err());
        assert!(be.start_connection().await.is_ok());
        assert_eq!(be.call_count(&BackendCall::StartConnection), 3);
    }

    #[tokio::test]
    async fn purchase_flow_pushes_signed_purchase() {
        let (mut be, mut rx) = FakeBackend::new(KEY);
        be.add_product("remove_ads", ProductCategory::NonConsumable, json!({}));
        be.start_connection().await.unwrap();

        let entry = CatalogEntry::new("remove_ads", ProductCategory::NonConsumable, json!({}));
        be.launch_purchase_flow(&entry).await.unwrap();

        let Some(BackendSignal::PurchasesUpdated(Ok(purchases))) = rx.recv().await else {
            panic!("expected purchase update");
        };
        assert_eq!(purchases.len(), 1);
        let p = &purchases[0];
        assert!(DigestVerifier.verify(&TrustKey::new(KEY), &p.original_payload, &p.signature));

        // Second flow for the same non-consumable hits the ownership conflict.
        be.launch_purchase_flow(&entry).await.unwrap();
        let Some(BackendSignal::PurchasesUpdated(Err(f))) = rx.recv().await else {
            panic!("expected flow failure");
        };
        assert_eq!(f.code, ResponseCode::ItemAlreadyOwned);
    }

    #[tokio::test]
    async fn tokens_are_deterministic() {
        let (a, _ra) = FakeBackend::new(KEY);
        let (b, _rb) = FakeBackend::new(KEY);
        let pa = a.seed_owned("coin_100", ProductCategory::Consumable);
        let pb = b.seed_owned("coin_100", ProductCategory::Consumable);
        assert_eq!(pa.purchase_token, pb.purchase_token);
        assert_eq!(pa.purchase_time, pb.purchase_time);
    }

    #[tokio::test]
    async fn consume_removes_ownership() {
        let (mut be, _rx) = FakeBackend::new(KEY);
        let p = be.seed_owned("coin_100", ProductCategory::Consumable);
        be.start_connection().await.unwrap();
        be.consume(&p.purchase_token).await.unwrap();
        assert!(be.owned_purchases().is_empty());

        let err = be.consume(&p.purchase_token).await.unwrap_err();
        assert_eq!(err.code, ResponseCode::ItemNotOwned);
    }

    #[tokio::test]
    async fn disconnect_emits_signal_and_drops_connection() {
        let (mut be, mut rx) = FakeBackend::new(KEY);
        be.start_connection().await.unwrap();
        be.disconnect();
        assert_eq!(rx.recv().await, Some(BackendSignal::ServiceDisconnected));
        assert_eq!(
            be.subscriptions_supported().await,
            SubscriptionSupport::Disconnected
        );
    }
}
