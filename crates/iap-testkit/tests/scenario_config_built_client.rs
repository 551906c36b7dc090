use iap_client::{BillingEvent, PurchasedResult};
use iap_testkit::{Harness, TRUST_KEY_ENV};

fn base() -> String {
    format!(
        r#"
products:
  consumable: [coin_100, coin_500]
  non_consumable: [remove_ads]
signature:
  trust_key_env: {TRUST_KEY_ENV}
"#
    )
}

const NO_AUTO_CONSUME: &str = r#"
billing:
  auto_consume: false
"#;

#[tokio::test]
async fn layered_config_drives_registration_and_toggles() {
    let base = base();
    let mut h = Harness::from_yaml(&[base.as_str(), NO_AUTO_CONSUME]).unwrap();
    h.client.connect().await.unwrap();

    let events = h.drain();
    let BillingEvent::ProductsFetched { entries } = &events[0] else {
        panic!("expected catalog first");
    };
    assert_eq!(entries.len(), 3);

    h.client.launch_purchase("coin_500").await.unwrap();
    h.client.process_pending_signals().await;
    assert_eq!(h.client.is_purchased("coin_500"), PurchasedResult::Yes, "held until consumed");
}

#[test]
fn overlapping_config_lists_fail_at_build() {
    let yaml = format!(
        "products:\n  consumable: [coin_100]\n  subscription: [coin_100]\nsignature:\n  trust_key_env: {TRUST_KEY_ENV}\n"
    );
    let err = Harness::from_yaml(&[yaml.as_str()]).err().expect("overlap must fail");
    assert!(format!("{err:#}").contains("configuration error"));
}
