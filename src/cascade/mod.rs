//! Dependency cascade: recursive, depth-bounded creation and deletion of
//! dependent instances along the catalog's AutoCreate/AutoDelete edges.

mod context;
mod engine;
mod validation;

pub use context::*;
pub use engine::*;
pub use validation::*;
