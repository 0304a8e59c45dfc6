use crate::config::{DbmConfig, RbmConfig};
use crate::errors::ConfigurationError;

#[test]
fn test_dbm_config_defaults_fill_missing_fields() {
    let config = DbmConfig::from_json_str(r#"{ "negative_chains": 5 }"#).unwrap();
    assert_eq!(config.negative_chains, 5);
    assert_eq!(config.seed, 17);
    assert!(!config.monitor_params);
    assert_eq!(config.print_interval, 10000);
}

#[test]
fn test_dbm_config_rejects_zero_chains() {
    let err = DbmConfig::from_json_str(r#"{ "negative_chains": 0 }"#).unwrap_err();
    assert!(matches!(
        err,
        ConfigurationError::ValueMustSatisfyComparison { ref value_name, .. } if value_name == "negative_chains"
    ));
    assert_eq!(err.to_string(), "negative_chains须≥1");
}

#[test]
fn test_dbm_config_keeps_reserved_print_interval() {
    let config = DbmConfig::from_json_str(r#"{ "negative_chains": 2, "print_interval": 50 }"#)
        .unwrap();
    assert_eq!(config.print_interval, 50);
    let err = DbmConfig::from_json_str(r#"{ "print_interval": 0 }"#).unwrap_err();
    assert_eq!(err.to_string(), "print_interval须≥1");
}

#[test]
fn test_dbm_config_parse_error() {
    let err = DbmConfig::from_json_str("{ negative_chains: }").unwrap_err();
    assert!(matches!(err, ConfigurationError::Parse(_)));
}

#[test]
fn test_dbm_config_from_file() {
    let path = "test_dbm_config_from_file.json";
    let config = DbmConfig::new(7).with_seed(3).with_monitor_params(true);
    std::fs::write(path, serde_json::to_string(&config).unwrap()).unwrap();
    let loaded = DbmConfig::from_json_file(path);
    std::fs::remove_file(path).unwrap();
    assert_eq!(loaded.unwrap(), config);
}

#[test]
fn test_rbm_config_requires_widths() {
    assert!(matches!(
        RbmConfig::from_json_str(r#"{ "nvis": 4 }"#),
        Err(ConfigurationError::Parse(_))
    ));
    let config = RbmConfig::from_json_str(r#"{ "nvis": 4, "nhid": 3 }"#).unwrap();
    assert_eq!(config, RbmConfig::new(4, 3));
}

#[test]
fn test_rbm_config_validation() {
    assert!(RbmConfig::new(0, 3).validate().is_err());
    assert!(RbmConfig::new(3, 0).validate().is_err());
    assert!(RbmConfig::new(3, 3).with_irange(-1.0).validate().is_err());
    assert!(RbmConfig::new(3, 3).with_irange(0.0).validate().is_ok());
}
