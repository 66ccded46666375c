//! Object model shared by the admission, cascade and reconciliation layers.

mod catalog;
mod descriptor;
mod edge;
mod key;

pub use catalog::*;
pub use descriptor::*;
pub use edge::*;
pub use key::*;

#[cfg(test)]
mod model_test;

/// Parameter name to value, ordered for stable logging and persistence.
pub type FieldValues = std::collections::BTreeMap<String, String>;
