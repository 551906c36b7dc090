use iap_backend_fake::BackendCall;
use iap_client::{BillingEvent, ProductCategory, PurchasedResult};
use iap_schemas::{BackendFailure, ResponseCode};
use iap_testkit::{names, Harness};

/// An owned purchase whose catalog entry failed to load must not be reported
/// as "not owned" once the catalog recovers.
#[tokio::test]
async fn owned_product_is_yes_after_catalog_recovers() {
    let mut h = Harness::coins_and_ads().unwrap();
    h.store.seed_owned("remove_ads", ProductCategory::NonConsumable);
    h.store.fail_catalog(
        ProductCategory::NonConsumable,
        BackendFailure::new(ResponseCode::ServiceTimeout, "catalog timeout"),
    );

    h.client.connect().await.unwrap();
    assert!(!h.client.is_ready());
    assert!(
        !h.client.purchases_fetched(),
        "owned purchase dropped for a missing catalog entry"
    );
    assert!(h.client.purchase("remove_ads").is_none());
    h.drain();

    h.client.refresh_catalog().await.unwrap();
    assert!(h.client.is_ready());
    assert!(h.client.purchases_fetched());
    assert_eq!(h.client.is_purchased("remove_ads"), PurchasedResult::Yes);
    assert_eq!(h.client.is_purchased("coin_100"), PurchasedResult::No);

    let events = h.drain();
    assert_eq!(
        names(&events),
        vec![
            "products_fetched",
            "purchased_products_fetched",
            "purchase_acknowledged"
        ]
    );
    assert!(matches!(
        &events[1],
        BillingEvent::PurchasedProductsFetched { records } if records.len() == 1
    ));
    assert_eq!(
        h.store.call_count(&BackendCall::QueryOwned(ProductCategory::NonConsumable)),
        2
    );
}

#[tokio::test]
async fn refresh_of_complete_catalog_does_not_requery_ownership() {
    let mut h = Harness::coins_and_ads().unwrap();
    h.client.connect().await.unwrap();
    assert!(h.client.purchases_fetched());
    h.store.clear_calls();

    h.client.refresh_catalog().await.unwrap();
    assert!(!h
        .store
        .calls()
        .iter()
        .any(|c| matches!(c, BackendCall::QueryOwned(_))));
}
