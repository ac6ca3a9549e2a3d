//! Nested recovery boundaries over the ambient execution state.
//!
//! A boundary saves a snapshot of [`AmbientState`] and receives a
//! [`FrameToken`]. When a recoverable failure reaches the boundary the owner
//! restores the snapshot and carries on after the protected region; on success
//! it pops the frame without restoring.
//!
//! Restoring a frame discards every frame opened above it, so a protected
//! region that fails while an inner frame is still open unwinds cleanly.
//! Popping is strict LIFO: popping a frame that is not on top, or restoring
//! one that is no longer on the stack, is a fatal defect.

use serde::{Deserialize, Serialize};

use crate::core::error::fatal;
use crate::core::object::ObjectId;

/// Execution state shared by every callback on the backend thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbientState {
    /// Object whose code is running.
    pub current_object: Option<ObjectId>,
    /// Object on whose behalf commands are executed.
    pub command_giver: Option<ObjectId>,
    /// Interactive object driving the current call, if any.
    pub current_interactive: Option<ObjectId>,
    /// Object whose heartbeat is running.
    pub current_heart_beat: Option<ObjectId>,
    /// Interpreter stack-depth marker.
    pub stack_depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RecoveryFrame {
    id: u64,
    snapshot: AmbientState,
}

/// Proof of a `save`; consumed by the matching `pop`.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a saved frame must be popped"]
pub struct FrameToken {
    id: u64,
    depth: usize,
}

impl FrameToken {
    /// Stack depth of the frame (0 is the outermost).
    pub const fn depth(&self) -> usize {
        self.depth
    }
}

/// LIFO stack of recovery frames.
#[derive(Debug, Default)]
pub struct RecoveryStack {
    frames: Vec<RecoveryFrame>,
    next_id: u64,
}

impl RecoveryStack {
    /// Empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Push a snapshot of `ambient`.
    pub fn save(&mut self, ambient: &AmbientState) -> FrameToken {
        let id = self.next_id;
        self.next_id += 1;
        let depth = self.frames.len();
        self.frames.push(RecoveryFrame {
            id,
            snapshot: *ambient,
        });
        FrameToken { id, depth }
    }

    /// Reset `ambient` to the snapshot of the frame `token` names.
    ///
    /// Frames above it were left open by the region that failed and are
    /// discarded. The frame itself stays on the stack so the protected region
    /// can be retried.
    pub fn restore(&mut self, token: &FrameToken, ambient: &mut AmbientState) {
        let Some(frame) = self.frames.get(token.depth).filter(|f| f.id == token.id).copied() else {
            fatal(&format!(
                "recovery restore of frame {} at depth {} which is not on the stack (depth {})",
                token.id,
                token.depth,
                self.frames.len()
            ));
        };
        let abandoned = self.frames.len() - (token.depth + 1);
        if abandoned > 0 {
            tracing::debug!(abandoned, depth = token.depth, "discarding unwound recovery frames");
            self.frames.truncate(token.depth + 1);
        }
        *ambient = frame.snapshot;
    }

    /// Discard the frame `token` names, which must be on top.
    pub fn pop(&mut self, token: FrameToken) {
        match self.frames.last() {
            Some(frame) if frame.id == token.id && self.frames.len() == token.depth + 1 => {
                self.frames.pop();
            }
            Some(frame) => fatal(&format!(
                "recovery pop out of order: frame {} at depth {} but top is frame {} at depth {}",
                token.id,
                token.depth,
                frame.id,
                self.frames.len() - 1
            )),
            None => fatal(&format!("recovery pop on an empty stack (frame {})", token.id)),
        }
    }
}
