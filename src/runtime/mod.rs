//! Runtime adapters and the status surface.

pub mod api;
pub mod sleep_poller;

pub use api::{health, snapshot, DriverSnapshot, Health};
pub use sleep_poller::SleepPoller;
