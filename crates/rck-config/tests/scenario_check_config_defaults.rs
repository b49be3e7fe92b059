//! Typed check config: defaults, overrides, and validation.

use rck_config::{load_layered_yaml_from_strings, CheckConfig};

#[test]
fn empty_config_yields_defaults() {
    let loaded = load_layered_yaml_from_strings(&["{}"]).unwrap();
    let cfg = loaded.check_config().unwrap();

    assert_eq!(cfg, CheckConfig::default());
    assert_eq!(cfg.metrics.statsd_host, "127.0.0.1");
    assert_eq!(cfg.metrics.statsd_port, 8125);
    assert_eq!(cfg.metrics.prefix, "aws");
    assert_eq!(cfg.inventory.region, "us-east-1");
    assert!(cfg.categories.ec2.enabled);
    assert!(cfg.categories.rds.enabled);
    assert!(cfg.categories.elasticache.enabled);
    assert_eq!(cfg.reconcile.allocation_policy, "key_order");
    assert_eq!(cfg.report.expiry_warning_days, 30);
}

#[test]
fn partial_sections_keep_sibling_defaults() {
    let yaml = r#"
metrics:
  statsd_port: 9125
categories:
  elasticache:
    enabled: false
"#;
    let cfg = load_layered_yaml_from_strings(&[yaml])
        .unwrap()
        .check_config()
        .unwrap();

    assert_eq!(cfg.metrics.statsd_port, 9125);
    assert_eq!(cfg.metrics.statsd_host, "127.0.0.1");
    assert!(!cfg.categories.elasticache.enabled);
    assert!(cfg.categories.ec2.enabled);
}

#[test]
fn wrong_type_is_rejected() {
    let yaml = "metrics:\n  statsd_port: \"not-a-port\"\n";
    let err = load_layered_yaml_from_strings(&[yaml])
        .unwrap()
        .check_config()
        .unwrap_err();
    assert!(format!("{err:#}").contains("CONFIG_INVALID"));
}

#[test]
fn zero_port_is_rejected() {
    let yaml = "metrics:\n  statsd_port: 0\n";
    let err = load_layered_yaml_from_strings(&[yaml])
        .unwrap()
        .check_config()
        .unwrap_err();
    assert!(err.to_string().contains("/metrics/statsd_port"));
}

#[test]
fn negative_warning_window_is_rejected() {
    let yaml = "report:\n  expiry_warning_days: -1\n";
    let err = load_layered_yaml_from_strings(&[yaml])
        .unwrap()
        .check_config()
        .unwrap_err();
    assert!(err.to_string().contains("expiry_warning_days"));
}
