use iap_config::load_layered_yaml_from_strings;
use iap_config::secrets::resolve_trust_key_with;

#[test]
fn literal_key_material_is_rejected_without_echoing_it() {
    let yaml = r#"
signature:
  trust_key_env: "MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEA"
"#;
    let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("CONFIG_SECRET_DETECTED"));
    assert!(msg.contains("/signature/trust_key_env"));
    assert!(!msg.contains("MIIBIjAN"));
}

#[test]
fn trust_key_read_from_named_var() {
    let loaded = load_layered_yaml_from_strings(&["signature:\n  trust_key_env: SHOP_KEY\n"]).unwrap();
    let key = resolve_trust_key_with(&loaded.billing, |name| {
        (name == "SHOP_KEY").then(|| "  c2VjcmV0  ".to_string())
    })
    .unwrap();
    assert_eq!(key.expose(), "c2VjcmV0");
    assert!(!format!("{key:?}").contains("c2VjcmV0"));
}

#[test]
fn missing_var_reports_name_only() {
    let loaded = load_layered_yaml_from_strings(&["{}"]).unwrap();
    let err = resolve_trust_key_with(&loaded.billing, |_| Some("   ".to_string())).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("SECRETS_MISSING"));
    assert!(msg.contains("IAP_TRUST_KEY"));
}

#[test]
fn process_env_lookup_uses_the_configured_name() {
    // Sentinel name never set anywhere; avoids mutating the test process env.
    let loaded = load_layered_yaml_from_strings(&[
        "signature:\n  trust_key_env: IAP_SENTINEL_TRUST_KEY_NEVER_SET\n",
    ])
    .unwrap();
    let err = iap_config::resolve_trust_key(&loaded.billing).unwrap_err();
    assert!(err.to_string().contains("IAP_SENTINEL_TRUST_KEY_NEVER_SET"));
}
