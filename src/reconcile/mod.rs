//! Reconciliation: diffs the instances the store knows against those a
//! backend reports and converges them according to ownership provenance.

mod engine;
mod merge;
mod plan;

pub use engine::*;
pub use merge::*;
pub use plan::*;
