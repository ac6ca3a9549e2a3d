//! Audit sink implementations.
//!
//! Every failure absorbed by a recovery boundary is recorded here so that
//! script errors which never reach a user stay visible to operators.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::clock::VirtualTime;
use crate::core::error::ScriptError;
use crate::core::object::ObjectId;
use crate::util::clock::now_ms;

/// Boundary that absorbed a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// A tick event in a drain batch.
    TickEvent,
    /// A heartbeat call.
    HeartBeat,
    /// The reset / clean-up sweep.
    Sweep,
    /// Startup preloading.
    Preload,
    /// Shutdown hooks.
    Shutdown,
    /// The backend loop's outermost frame.
    Backend,
}

/// Audit event structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Boundary that absorbed the failure.
    pub boundary: Boundary,
    /// Tick event label or preload file, when there is one.
    pub context: Option<String>,
    /// Object that raised the failure, if known.
    pub object: Option<ObjectId>,
    /// Failure message.
    pub message: String,
    /// Virtual time of the failure.
    pub virtual_time: VirtualTime,
    /// Wall-clock timestamp in milliseconds.
    pub created_at_ms: u128,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// In-memory audit sink with a bounded buffer.
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events.min(1024)),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Sink that forwards events to `tracing` and keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&mut self, event: AuditEvent) {
        tracing::warn!(
            boundary = ?event.boundary,
            object = ?event.object,
            context = event.context.as_deref().unwrap_or(""),
            virtual_time = event.virtual_time,
            "absorbed failure: {}",
            event.message
        );
    }
}

/// Helper to build an audit event from a failure.
pub fn build_audit_event(
    boundary: Boundary,
    context: Option<&str>,
    error: &ScriptError,
    virtual_time: VirtualTime,
) -> AuditEvent {
    AuditEvent {
        boundary,
        context: context.map(str::to_owned),
        object: error.object,
        message: error.message.clone(),
        virtual_time,
        created_at_ms: now_ms(),
    }
}
