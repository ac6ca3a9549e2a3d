//! Tests for audit sink

use driver_backend::core::{build_audit_event, AuditSink, Boundary, InMemoryAuditSink, ScriptError};

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);

    let event = build_audit_event(
        Boundary::HeartBeat,
        None,
        &ScriptError::new("division by zero"),
        42,
    );

    sink.record(event);
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].boundary, Boundary::HeartBeat);
    assert_eq!(events[0].message, "division by zero");
    assert_eq!(events[0].virtual_time, 42);
    assert!(events[0].created_at_ms > 0);
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);

    for (i, file) in ["a", "b", "c"].iter().enumerate() {
        sink.record(build_audit_event(
            Boundary::Preload,
            Some(*file),
            &ScriptError::new("load failed"),
            i64::try_from(i).unwrap(),
        ));
    }

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].context.as_deref(), Some("b")); // First one popped
    assert_eq!(events[1].context.as_deref(), Some("c"));
}

#[test]
fn test_boundary_serializes_snake_case() {
    let event = build_audit_event(Boundary::TickEvent, Some("call_out"), &ScriptError::new("x"), 7);
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["boundary"], "tick_event");
    assert_eq!(json["context"], "call_out");
}
