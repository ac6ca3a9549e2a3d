//! Unit tests for individual components

mod audit_test;
mod config_test;
mod error_test;
mod load_test;
mod recovery_test;
mod util_test;
