use siege_common::{Config, ConfigError};

#[test]
fn test_defaults() {
    let config = Config::default();

    assert_eq!(config.endpoint.url, "ws://127.0.0.1:8080/");
    assert_eq!(config.endpoint.connect_timeout_ms, 5000);
    assert_eq!(config.pool.worker_count, 500);
    assert_eq!(config.pool.stagger_ms, 20);
    assert_eq!(config.pool.backoff_ms, 1000);
    assert_eq!(config.pool.receive_timeout_ms, 1000);
    assert_eq!(config.pool.grace_period_ms, 10_000);
    assert_eq!(config.stats.interval_secs, 5);
    assert!(!config.metrics.enabled);

    config.validate().expect("defaults are valid");
}

#[test]
fn test_partial_yaml_falls_back_to_defaults() {
    let config: Config = serde_yaml::from_str(
        "pool:\n  worker_count: 7\nmetrics:\n  enabled: true\n",
    )
    .unwrap();

    assert_eq!(config.pool.worker_count, 7);
    assert_eq!(config.pool.stagger_ms, 20);
    assert!(config.metrics.enabled);
    assert_eq!(config.metrics.port, 9090);
    assert_eq!(config.endpoint.url, "ws://127.0.0.1:8080/");
}

#[test]
fn test_validate_rejects_zero_intervals() {
    let mut config = Config::default();
    config.stats.interval_secs = 0;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

    let mut config = Config::default();
    config.pool.receive_timeout_ms = 0;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

    let mut config = Config::default();
    config.endpoint.connect_timeout_ms = 0;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_validate_rejects_receive_ceiling_above_grace_period() {
    let mut config = Config::default();
    config.pool.receive_timeout_ms = 20_000;
    config.pool.grace_period_ms = 10_000;

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("grace_period"));
}

#[test]
fn test_validate_rejects_empty_url() {
    let mut config = Config::default();
    config.endpoint.url.clear();
    assert!(config.validate().is_err());
}
