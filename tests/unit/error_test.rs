//! Tests for error types

use driver_backend::core::{Driver, ObjectSpec, SchedulerError, ScriptError};
use driver_backend::config::DriverConfig;

#[test]
fn test_object_destructed_error() {
    let mut driver = Driver::new(DriverConfig::default(), 0);
    let ob = driver.create_object(ObjectSpec::new("x"));
    let err = SchedulerError::ObjectDestructed(ob);
    assert_eq!(format!("{err}"), format!("object destructed: #{}.{}", ob.index(), ob.generation()));
}

#[test]
fn test_invalid_period_error() {
    let mut driver = Driver::new(DriverConfig::default(), 0);
    let ob = driver.create_object(ObjectSpec::new("x"));
    let err = SchedulerError::InvalidPeriod { object: ob, period: -3 };
    assert!(format!("{err}").starts_with("invalid heartbeat period -3 for #"));
}

#[test]
fn test_invalid_config_error() {
    let err = SchedulerError::InvalidConfig("io_slice_ms must be greater than 0".to_string());
    assert_eq!(format!("{err}"), "config invalid: io_slice_ms must be greater than 0");
}

#[test]
fn test_script_error_keeps_first_object() {
    let mut driver = Driver::new(DriverConfig::default(), 0);
    let a = driver.create_object(ObjectSpec::new("a"));
    let b = driver.create_object(ObjectSpec::new("b"));

    let err = ScriptError::new("bad argument 1 to call_other()");
    assert_eq!(err.to_string(), "bad argument 1 to call_other()");
    assert_eq!(err.object, None);

    let err = err.or_object(a).or_object(b);
    assert_eq!(err.object, Some(a));
}
