use iap_backend_fake::{DigestVerifier, FakeBackend};
use iap_client::{
    BillingClientBuilder, BillingError, BillingEvent, ErrorKind, ProductCategory, PurchasedResult,
    ReconnectPolicy, SessionState,
};
use iap_schemas::{BackendFailure, ResponseCode};
use iap_signature::TrustKey;
use serde_json::json;
use tokio::sync::mpsc;

#[tokio::test]
async fn missing_catalog_entry_keeps_client_not_ready() {
    let (backend, signals) = FakeBackend::new("k");
    let probe = backend.clone();
    probe.add_product("coin_100", ProductCategory::Consumable, json!({}));
    // "gem_pack" is registered but unknown to the store.

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut client = BillingClientBuilder::new()
        .consumables(["coin_100", "gem_pack"])
        .verifier(DigestVerifier)
        .trust_key(TrustKey::new("k"))
        .sink(tx)
        .reconnect_policy(ReconnectPolicy::immediate())
        .build(backend, signals)
        .unwrap();
    client.connect().await.unwrap();

    assert_eq!(client.session_state(), SessionState::Connected);
    assert!(!client.is_ready());
    assert_eq!(client.is_purchased("coin_100"), PurchasedResult::ClientNotReady);

    let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
    assert!(events.iter().any(|e| matches!(
        e,
        BillingEvent::Error { error, .. }
            if error.kind == ErrorKind::ProductNotExist && error.message.contains("gem_pack")
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        BillingEvent::ProductsFetched { entries } if entries.len() == 1
    )));
}

#[tokio::test]
async fn failed_catalog_query_recovers_with_refresh() {
    let (backend, signals) = FakeBackend::new("k");
    let probe = backend.clone();
    probe.add_product("remove_ads", ProductCategory::NonConsumable, json!({}));
    probe.fail_catalog(
        ProductCategory::NonConsumable,
        BackendFailure::new(ResponseCode::ServiceTimeout, "timeout"),
    );

    let mut client = BillingClientBuilder::new()
        .non_consumables(["remove_ads"])
        .verifier(DigestVerifier)
        .trust_key(TrustKey::new("k"))
        .reconnect_policy(ReconnectPolicy::immediate())
        .build(backend, signals)
        .unwrap();
    client.connect().await.unwrap();
    assert!(!client.is_ready());
    assert_eq!(
        client.refresh_purchases().await,
        Err(BillingError::NotReady)
    );

    client.refresh_catalog().await.unwrap();
    assert!(client.is_ready());
    assert_eq!(client.catalog().len(), 1);
}
