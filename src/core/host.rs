//! Collaborator traits: the script host and the I/O poller.
//!
//! The scheduler never interprets scripts or touches sockets. It reaches the
//! interpreter, compiler and master object through [`ScriptHost`] and the
//! network layer through [`IoPoller`]. Every callback receives the
//! [`Driver`] so it can reschedule, change heartbeats or destruct objects while
//! the scheduler is mid-walk.
//!
//! # Example
//!
//! ```rust,ignore
//! use driver_backend::core::{Driver, ObjectId, ScriptError, ScriptHost, ScriptResult};
//!
//! struct Interpreter { budget: u64 }
//!
//! impl ScriptHost for Interpreter {
//!     fn set_eval_cost(&mut self, cost: u64) {
//!         self.budget = cost;
//!     }
//!
//!     fn heart_beat(&mut self, driver: &mut Driver, object: ObjectId) -> ScriptResult<()> {
//!         // run the object's heart_beat() in the interpreter
//!         Ok(())
//!     }
//! }
//! ```

use std::time::Duration;

use crate::core::driver::Driver;
use crate::core::error::ScriptResult;
use crate::core::object::ObjectId;

/// Operations the scheduler consumes from the scripting runtime.
///
/// Only [`set_eval_cost`](ScriptHost::set_eval_cost) and
/// [`heart_beat`](ScriptHost::heart_beat) are required; the other hooks
/// default to doing nothing.
pub trait ScriptHost {
    /// Set the evaluation cost budget for the callback about to run.
    fn set_eval_cost(&mut self, cost: u64);

    /// Run `object`'s heartbeat function.
    fn heart_beat(&mut self, driver: &mut Driver, object: ObjectId) -> ScriptResult<()>;

    /// Run `object`'s reset function.
    fn reset(&mut self, _driver: &mut Driver, _object: ObjectId) -> ScriptResult<()> {
        Ok(())
    }

    /// Offer `object` the chance to clean itself up.
    ///
    /// `inherited` is 0 for clones and otherwise the number of references on
    /// the object's program. Returning `false` stops future probes.
    fn clean_up(
        &mut self,
        _driver: &mut Driver,
        _object: ObjectId,
        _inherited: u32,
    ) -> ScriptResult<bool> {
        Ok(false)
    }

    /// Object that `object` shadows, if any.
    fn shadowing(&self, driver: &Driver, object: ObjectId) -> Option<ObjectId> {
        driver.objects().get(object).and_then(|ob| ob.shadowing)
    }

    /// Final teardown of a destructed object, run outside any callback just
    /// before its slot is freed.
    fn finalize(&mut self, _driver: &mut Driver, _object: ObjectId) {}

    /// Sweep stale references to destructed objects. Returns how many were
    /// cleared.
    fn reclaim(&mut self, _driver: &mut Driver) -> usize {
        0
    }

    /// Ask the master object for the files to preload.
    fn epilog(&mut self, _driver: &mut Driver, _eflag: bool) -> ScriptResult<Option<Vec<String>>> {
        Ok(None)
    }

    /// Ask the master object to load one preload file.
    fn preload(&mut self, _driver: &mut Driver, _file: &str) -> ScriptResult<()> {
        Ok(())
    }

    /// Notify the master object of a delayed shutdown.
    fn slow_shutdown(&mut self, _driver: &mut Driver, _minutes: u32) -> ScriptResult<()> {
        Ok(())
    }

    /// Periodic decay of per-object statistics.
    fn decay_stats(&mut self, _driver: &mut Driver) {}
}

/// Network and socket polling run between clock advances.
pub trait IoPoller {
    /// Process I/O for roughly `slice`. Commands from users are executed here.
    fn poll(
        &mut self,
        driver: &mut Driver,
        host: &mut dyn ScriptHost,
        slice: Duration,
    ) -> ScriptResult<()>;
}
