//! Configuration models for the scheduler and its maintenance passes.

pub mod driver;

pub use driver::DriverConfig;
