//! Error types for scheduler operations.

use thiserror::Error;

use crate::core::object::ObjectId;

/// Errors produced by scheduler components for rejected operations.
///
/// None of these abort a callback; they are returned to the collaborator that
/// asked for the change and leave scheduler state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The object has been destructed (or its slot already reclaimed).
    #[error("object destructed: {0}")]
    ObjectDestructed(ObjectId),
    /// The object is not on the heartbeat list.
    #[error("object not on heartbeat list: {0}")]
    NotRegistered(ObjectId),
    /// A heartbeat period was rejected.
    #[error("invalid heartbeat period {period} for {object}")]
    InvalidPeriod {
        /// Target object.
        object: ObjectId,
        /// Rejected period.
        period: i32,
    },
    /// Configuration failed validation.
    #[error("config invalid: {0}")]
    InvalidConfig(String),
}

/// A recoverable failure raised by a scripted callback.
///
/// It travels as the `Err` side of a callback's result until the nearest
/// recovery boundary absorbs it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScriptError {
    /// Human-readable failure description.
    pub message: String,
    /// Object that was executing when the failure was raised, if known.
    pub object: Option<ObjectId>,
}

impl ScriptError {
    /// Create an error with no originating object.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            object: None,
        }
    }

    /// Attach `object` unless the failure already names one.
    #[must_use]
    pub fn or_object(mut self, object: ObjectId) -> Self {
        self.object = self.object.or(Some(object));
        self
    }
}

/// Result type returned by scripted callbacks.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

/// Report a broken scheduler invariant and terminate.
///
/// Invariant violations are never recoverable: no recovery boundary absorbs a
/// panic, so this unwinds out of the backend loop and ends the process.
#[track_caller]
pub fn fatal(msg: &str) -> ! {
    tracing::error!("BUG: {msg}");
    panic!("BUG: {msg}");
}
