use qagate_core::{AccessError, LogFormat, QagateConfig, ResourceKind};

#[test]
fn empty_document_uses_defaults() {
    let config = QagateConfig::from_yaml_str("").unwrap();
    assert_eq!(config.identity.cache_ttl_secs, 30);
    assert_eq!(config.identity.outage_ttl_secs, 2);
    assert!(config.rules.cache_enabled);
    assert_eq!(config.rules.snapshot_ttl_secs, 60);
    assert_eq!(config.audit.capacity, 1000);
    assert_eq!(config.server.bind, "0.0.0.0:3000");
    assert_eq!(config.server.log_format, LogFormat::Pretty);
    assert!(config.validate().is_ok());
}

#[test]
fn partial_sections_fill_defaults() {
    let yaml = r#"
identity:
  cache_ttl_secs: 10
server:
  log_format: json
"#;
    let config = QagateConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(config.identity.cache_ttl_secs, 10);
    assert_eq!(config.identity.outage_ttl_secs, 2);
    assert_eq!(config.server.log_format, LogFormat::Json);
}

#[test]
fn custom_catalog() {
    let yaml = r#"
catalog:
  - name: Wallboard
    kind: page
    category: Floor
    display_label: Wallboard
"#;
    let config = QagateConfig::from_yaml_str(yaml).unwrap();
    let catalog = config.catalog().unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.lookup("wallboard").unwrap().kind, ResourceKind::Page);
}

#[test]
fn outage_ttl_cannot_exceed_cache_ttl() {
    let yaml = r#"
identity:
  cache_ttl_secs: 5
  outage_ttl_secs: 10
"#;
    let config = QagateConfig::from_yaml_str(yaml).unwrap();
    assert!(matches!(config.validate(), Err(AccessError::Config(_))));
}

#[test]
fn malformed_yaml_is_config_error() {
    let err = QagateConfig::from_yaml_str("identity: [").unwrap_err();
    assert!(matches!(err, AccessError::Config(_)));
}

#[test]
fn builder_setters() {
    let config = QagateConfig::default()
        .with_auth_cache_ttl(90)
        .with_snapshot_ttl(5)
        .without_snapshot_cache();
    assert_eq!(config.identity.cache_ttl_secs, 90);
    assert_eq!(config.rules.snapshot_ttl_secs, 5);
    assert!(!config.rules.cache_enabled);
}
