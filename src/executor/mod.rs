//! Backend execution: the [`BackendExecutor`] seam used by the cascade and
//! reconciliation engines, and its router over per-style operation handlers.

mod backend_executor;
mod operation;
mod protocol;
mod router;
mod sequenced;

pub use backend_executor::*;
pub use operation::*;
pub use protocol::*;
pub use router::*;
pub use sequenced::*;
