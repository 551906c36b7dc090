use iap_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
products:
  consumable: [coin_100]
  non_consumable: [remove_ads]
billing:
  auto_acknowledge: true
signature:
  trust_key_env: IAP_TRUST_KEY
"#;

const BASE_YAML_REORDERED: &str = r#"
signature:
  trust_key_env: IAP_TRUST_KEY
billing:
  auto_acknowledge: true
products:
  non_consumable: [remove_ads]
  consumable: [coin_100]
"#;

const OVERLAY_YAML: &str = r#"
billing:
  auto_acknowledge: false
reconnect:
  max_attempts: 5
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash.len(), 64, "sha256 hex");
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(original.config_hash, reordered.config_hash);
}

#[test]
fn overlay_changes_hash_and_typed_view() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let layered = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_ne!(base.config_hash, layered.config_hash);
    assert!(base.billing.billing.auto_acknowledge);
    assert!(!layered.billing.billing.auto_acknowledge);
    assert!(layered.billing.billing.auto_consume, "untouched default");
    assert_eq!(layered.billing.reconnect.max_attempts, Some(5));
    assert_eq!(layered.billing.reconnect.initial_delay_ms, 250);
    assert_eq!(layered.billing.products.consumable, vec!["coin_100"]);
}
