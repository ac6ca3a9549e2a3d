//! Tests for configuration validation

use std::collections::HashMap;

use driver_backend::config::DriverConfig;

#[test]
fn test_defaults_are_valid() {
    let cfg = DriverConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.sweep_interval_secs, 300);
    assert_eq!(cfg.reclaim_interval_secs, 60);
    assert_eq!(cfg.heartbeat_chunk, 32);
    assert_eq!(cfg.io_slice().as_millis(), 1000);
    assert!(cfg.heartbeat_round_budget().is_none());
}

#[test]
fn test_zero_intervals_rejected() {
    let cases = [
        DriverConfig { heartbeat_interval_secs: 0, ..DriverConfig::default() },
        DriverConfig { sweep_interval_secs: 0, ..DriverConfig::default() },
        DriverConfig { reclaim_interval_secs: 0, ..DriverConfig::default() },
        DriverConfig { stats_decay_interval_secs: Some(0), ..DriverConfig::default() },
        DriverConfig { heartbeat_chunk: 0, ..DriverConfig::default() },
        DriverConfig { io_slice_ms: 0, ..DriverConfig::default() },
        DriverConfig { max_eval_cost: 0, ..DriverConfig::default() },
    ];
    for cfg in cases {
        assert!(cfg.validate().is_err(), "{cfg:?} should be invalid");
    }
}

#[test]
fn test_negative_times_rejected() {
    let cfg = DriverConfig { time_to_reset_secs: -1, ..DriverConfig::default() };
    assert!(cfg.validate().is_err());
    let cfg = DriverConfig { time_to_clean_up_secs: -1, ..DriverConfig::default() };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_from_json_str_fills_defaults() {
    let cfg = DriverConfig::from_json_str(
        r#"{ "time_to_reset_secs": 1800, "heartbeat_round_budget_ms": 250 }"#,
    )
    .unwrap();
    assert_eq!(cfg.time_to_reset_secs, 1800);
    assert_eq!(cfg.heartbeat_round_budget().map(|d| d.as_millis()), Some(250));
    assert_eq!(cfg.time_to_clean_up_secs, 600);
}

#[test]
fn test_from_json_str_errors() {
    assert!(DriverConfig::from_json_str("not json").unwrap_err().starts_with("parse error"));
    assert!(DriverConfig::from_json_str(r#"{ "io_slice_ms": 0 }"#).is_err());
}

#[test]
fn test_from_lookup() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("DRIVER_SWEEP_INTERVAL_SECS", "120"),
        ("DRIVER_STATS_DECAY_INTERVAL_SECS", "3600"),
        ("DRIVER_HEARTBEAT_CHUNK", " 64 "),
    ]);
    let cfg = DriverConfig::from_lookup(|key| vars.get(key).map(|v| (*v).to_string())).unwrap();
    assert_eq!(cfg.sweep_interval_secs, 120);
    assert_eq!(cfg.stats_decay_interval_secs, Some(3600));
    assert_eq!(cfg.heartbeat_chunk, 64);
    assert_eq!(cfg.heartbeat_round_budget_ms, None);
}

#[test]
fn test_from_lookup_rejects_garbage() {
    let err = DriverConfig::from_lookup(|key| {
        (key == "DRIVER_IO_SLICE_MS").then(|| "soon".to_string())
    })
    .unwrap_err();
    assert!(err.starts_with("DRIVER_IO_SLICE_MS"));
}
