//! Admission and concurrency control: the bounded task queue, the hold gate
//! checked before enqueuing, and the arbiter that serializes write-class
//! operations.

mod hold;
mod queue;
mod write_lock;

pub use hold::*;
pub use queue::*;
pub use write_lock::*;
