//! Builders to construct a backend from configuration.

pub mod backend_builder;

pub use backend_builder::{build_backend, build_backend_from_env, build_backend_from_lookup, BuiltBackend};
