//! # Driver Backend
//!
//! The time-driven scheduling core of a server hosting many independently
//! scripted objects.
//!
//! Objects have periodic behaviours: heartbeats, resets and idle clean-up.
//! All of them run on one logical thread, driven by a virtual clock that
//! trails real time one second at a time, and all of them must survive
//! callbacks that fail, destruct themselves, or mutate the very structures the
//! scheduler is walking.
//!
//! ## Key Pieces
//!
//! - **Virtual clock**: integer seconds that never rewind and catch up to real
//!   time without skipping a tick
//! - **Tick event queue**: one-shot callbacks keyed by virtual time, with lazy
//!   cancellation
//! - **Heartbeats**: a round-robin list that tolerates additions and removals
//!   mid-round
//! - **Recovery frames**: LIFO save/restore of ambient execution state around
//!   every callback boundary
//! - **Sweep and reaper**: the periodic reset / clean-up walk and deferred
//!   teardown of destructed objects
//! - **Load tracking**: exponentially decayed command and compile rates
//!
//! The scripting runtime and the network layer stay outside the crate and are
//! reached through the [`core::ScriptHost`] and [`core::IoPoller`] traits.
//!
//! ```rust,ignore
//! use driver_backend::builders::build_backend_from_env;
//! use driver_backend::core::SystemTimeSource;
//! use driver_backend::runtime::SleepPoller;
//!
//! driver_backend::util::init_tracing();
//! let (mut backend, audit) = build_backend_from_env(MyHost::new(), SystemTimeSource)?;
//! backend.start();
//! backend.preload_objects(false);
//! backend.run(&mut SleepPoller);
//! ```
//!
//! For complete scenarios, see the integration tests under `tests/`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Scheduling core: clock, queue, heartbeats, recovery, sweep, reaper, load.
pub mod core;
/// Configuration for the driver and its maintenance passes.
pub mod config;
/// Builders to construct a backend from configuration.
pub mod builders;
/// Runtime adapters and serializable status models.
pub mod runtime;
/// Shared utilities.
pub mod util;
