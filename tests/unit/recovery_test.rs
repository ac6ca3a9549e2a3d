//! Tests for recovery frames

use driver_backend::config::DriverConfig;
use driver_backend::core::{AmbientState, Driver, ObjectSpec, RecoveryStack, ScriptError};

#[test]
fn test_nested_frames_restore_their_own_snapshot() {
    let mut stack = RecoveryStack::new();
    let mut ambient = AmbientState::default();

    let outer = stack.save(&ambient);
    ambient.stack_depth = 1;
    let inner = stack.save(&ambient);
    ambient.stack_depth = 2;

    stack.restore(&inner, &mut ambient);
    assert_eq!(ambient.stack_depth, 1);
    stack.pop(inner);

    ambient.stack_depth = 5;
    stack.restore(&outer, &mut ambient);
    assert_eq!(ambient.stack_depth, 0);
    stack.pop(outer);
    assert_eq!(stack.depth(), 0);
}

#[test]
#[should_panic(expected = "out of order")]
fn test_popping_outer_frame_first_is_fatal() {
    let mut stack = RecoveryStack::new();
    let ambient = AmbientState::default();
    let outer = stack.save(&ambient);
    let _inner = stack.save(&ambient);
    stack.pop(outer);
}

#[test]
fn test_nested_catch_isolates_inner_failure() {
    let mut driver = Driver::new(DriverConfig::default(), 0);
    let ob = driver.create_object(ObjectSpec::new("caller"));

    let outer = driver.catch(|d| {
        d.ambient_mut().current_object = Some(ob);
        let inner: Result<(), ScriptError> = d.catch(|d| {
            d.ambient_mut().current_object = None;
            d.ambient_mut().stack_depth = 9;
            Err(ScriptError::new("inner"))
        });
        assert!(inner.is_err());
        assert_eq!(d.ambient().current_object, Some(ob));
        assert_eq!(d.recovery_depth(), 1);
        Ok(d.ambient().stack_depth)
    });

    assert_eq!(outer, Ok(0));
    assert_eq!(driver.recovery_depth(), 0);
}

#[test]
fn test_catch_discards_frame_left_open_by_failing_region() {
    let mut driver = Driver::new(DriverConfig::default(), 0);

    let result: Result<(), ScriptError> = driver.catch(|d| {
        let _inner = d.save_context();
        let _deeper = d.save_context();
        d.ambient_mut().stack_depth = 3;
        Err(ScriptError::new("unwound past two frames"))
    });

    assert!(result.is_err());
    assert_eq!(driver.recovery_depth(), 0);
    assert_eq!(driver.ambient().stack_depth, 0);
}
