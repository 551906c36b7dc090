use iap_client::{BillingEvent, ErrorKind, ErrorSource, ProductCategory, PurchasedResult};
use iap_schemas::{BackendFailure, ResponseCode};
use iap_testkit::Harness;

#[tokio::test]
async fn already_owned_is_surfaced_as_conflict_and_refresh_heals() {
    let mut h = Harness::coins_and_ads().unwrap();
    h.client.connect().await.unwrap();
    h.drain();

    // Bought on another device after our bootstrap.
    h.store.seed_owned("remove_ads", ProductCategory::NonConsumable);
    assert_eq!(h.client.is_purchased("remove_ads"), PurchasedResult::No);

    h.client.launch_purchase("remove_ads").await.unwrap();
    h.client.process_pending_signals().await;

    let events = h.drain();
    assert_eq!(events.len(), 1);
    match &events[0] {
        BillingEvent::Error { source, error } => {
            assert_eq!(*source, ErrorSource::PurchaseFlow);
            assert_eq!(error.kind, ErrorKind::ItemAlreadyOwned);
            assert_eq!(error.raw_code, Some(7));
        }
        other => panic!("unexpected {other:?}"),
    }

    h.client.refresh_purchases().await.unwrap();
    assert_eq!(h.client.is_purchased("remove_ads"), PurchasedResult::Yes);
}

#[tokio::test]
async fn user_cancel_is_reported_with_its_own_kind() {
    let mut h = Harness::coins_and_ads().unwrap();
    h.client.connect().await.unwrap();
    h.drain();

    h.store
        .fail_next_flow(BackendFailure::new(ResponseCode::UserCanceled, "canceled"));
    h.client.launch_purchase("coin_100").await.unwrap();
    h.client.process_pending_signals().await;

    let events = h.drain();
    assert!(matches!(
        &events[..],
        [BillingEvent::Error { error, .. }] if error.kind == ErrorKind::UserCanceled
    ));
    assert!(h.client.purchased_products().is_empty());
}
