//! Thread-safe shutdown requests.
//!
//! The backend itself is single-threaded, but shutdown is commonly requested
//! from a signal handler or an I/O thread, so the request flag lives behind a
//! `parking_lot` mutex and the handle is cheap to clone.

use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct ShutdownState {
    immediate: bool,
    slow_minutes: Option<u32>,
}

/// Cloneable handle for requesting backend shutdown.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    state: Arc<Mutex<ShutdownState>>,
}

impl ShutdownHandle {
    /// New handle with nothing requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the backend loop at its next checkpoint.
    pub fn request_shutdown(&self) {
        self.state.lock().immediate = true;
    }

    /// Tell the master object that the server goes down in `minutes`.
    pub fn request_slow_shutdown(&self, minutes: u32) {
        self.state.lock().slow_minutes = Some(minutes);
    }

    /// True once an immediate shutdown was requested.
    pub fn is_requested(&self) -> bool {
        self.state.lock().immediate
    }

    /// Take a pending slow-shutdown request.
    pub fn take_slow(&self) -> Option<u32> {
        self.state.lock().slow_minutes.take()
    }
}
