use iap_backend_fake::{BackendCall, DigestVerifier, FakeBackend};
use iap_client::{
    BillingClientBuilder, BillingError, ProductCategory, PurchasedResult, ReconnectPolicy,
    SessionState,
};
use iap_signature::TrustKey;
use serde_json::json;

#[tokio::test]
async fn release_stops_the_session_and_connect_restarts_it() {
    let (backend, signals) = FakeBackend::new("k");
    let probe = backend.clone();
    probe.add_product("remove_ads", ProductCategory::NonConsumable, json!({}));
    probe.seed_owned("remove_ads", ProductCategory::NonConsumable);

    let mut client = BillingClientBuilder::new()
        .non_consumables(["remove_ads"])
        .verifier(DigestVerifier)
        .trust_key(TrustKey::new("k"))
        .reconnect_policy(ReconnectPolicy::immediate())
        .build(backend, signals)
        .unwrap();
    client.connect().await.unwrap();
    assert_eq!(client.is_purchased("remove_ads"), PurchasedResult::Yes);

    client.release().await;
    assert_eq!(client.session_state(), SessionState::Disconnected);
    assert!(!probe.is_connected());
    assert_eq!(client.is_purchased("remove_ads"), PurchasedResult::ClientNotReady);
    assert_eq!(
        client.launch_purchase("remove_ads").await,
        Err(BillingError::NotReady)
    );

    // A disconnect notice after release does not resurrect the session.
    probe.disconnect();
    client.process_pending_signals().await;
    assert_eq!(client.session_state(), SessionState::Disconnected);
    assert_eq!(probe.call_count(&BackendCall::StartConnection), 1);

    client.connect().await.unwrap();
    assert_eq!(client.session_state(), SessionState::Connected);
    assert_eq!(
        probe.call_count(&BackendCall::QueryCatalog(ProductCategory::NonConsumable)),
        2
    );
    assert_eq!(client.is_purchased("remove_ads"), PurchasedResult::Yes);
}
