//! Tests for utility functions

use driver_backend::core::{ManualTimeSource, SystemTimeSource, TimeSource};
use driver_backend::util::{init_tracing, now_ms, now_secs};

#[test]
fn test_wall_clock_is_after_epoch() {
    assert!(now_ms() > 1_600_000_000_000);
    assert!(now_secs() > 1_600_000_000);
}

#[test]
fn test_system_time_source_matches_now_secs() {
    let source = SystemTimeSource;
    assert!((source.now_secs() - now_secs()).abs() <= 1);
}

#[test]
fn test_manual_time_source_shared_between_clones() {
    let source = ManualTimeSource::new(10);
    let view = source.clone();
    source.advance(5);
    assert_eq!(view.now_secs(), 15);
    view.set(3);
    assert_eq!(source.now_secs(), 3);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    tracing::info!("tracing initialized");
}
