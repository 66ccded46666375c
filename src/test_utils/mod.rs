//! Shared helpers for the unit tests: logger setup, object-model fixtures
//! and an in-memory backend with failure injection.
mod common;
mod fake_backend;
mod fixtures;

pub use common::*;
pub use fake_backend::*;
pub use fixtures::*;
