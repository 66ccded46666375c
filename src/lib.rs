//! Consistency core of a device configuration manager.
//!
//! Requests are admitted through a hold gate into a bounded queue, run on
//! a fixed worker pool, and serialized behind a single write lock. Add and
//! delete requests cascade along the dependency edges of the object
//! model; discover requests reconcile the local store with the backends
//! that own the live configuration.

mod admission;
mod cascade;
mod config;
mod daemon;
mod errors;
mod executor;
mod model;
mod reconcile;
mod storage;

pub mod constants;
pub mod metrics;
pub mod utils;

pub use admission::*;
pub use cascade::*;
pub use self::config::*;
pub use daemon::*;
pub use errors::*;
pub use executor::*;
pub use model::*;
pub use reconcile::*;
pub use storage::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
