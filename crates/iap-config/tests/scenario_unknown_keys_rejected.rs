use iap_config::load_layered_yaml_from_strings;

#[test]
fn misspelled_key_fails_closed() {
    let yaml = "billing:\n  auto_acknowlege: false\n";
    let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err();
    assert!(format!("{err:#}").contains("CONFIG_INVALID"));
}

#[test]
fn unknown_top_level_section_fails_closed() {
    let err = load_layered_yaml_from_strings(&["broker:\n  name: alpaca\n"]).unwrap_err();
    assert!(format!("{err:#}").contains("CONFIG_INVALID"));
}

#[test]
fn inverted_backoff_bounds_rejected() {
    let yaml = "reconnect:\n  initial_delay_ms: 5000\n  max_delay_ms: 100\n";
    let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err();
    assert!(err.to_string().contains("max_delay_ms"));
}

#[test]
fn zero_attempts_rejected() {
    let err = load_layered_yaml_from_strings(&["reconnect:\n  max_attempts: 0\n"]).unwrap_err();
    assert!(err.to_string().contains("max_attempts"));
}

#[test]
fn absent_sections_take_defaults() {
    let loaded = load_layered_yaml_from_strings(&["products:\n  subscription: [vip_monthly]\n"]).unwrap();
    let cfg = &loaded.billing;
    assert!(cfg.products.consumable.is_empty());
    assert_eq!(cfg.products.total(), 1);
    assert!(cfg.billing.auto_acknowledge && cfg.billing.auto_consume);
    assert_eq!(cfg.signature.trust_key_env, "IAP_TRUST_KEY");
    assert_eq!(cfg.reconnect.max_delay_ms, 30_000);
    assert_eq!(cfg.reconnect.max_attempts, None);
}
