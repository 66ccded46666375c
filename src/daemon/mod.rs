mod builder;
#[allow(clippy::module_inception)]
mod daemon;
mod dispatcher;
mod processor;
mod request;
mod worker;

pub use builder::*;
pub use daemon::*;
pub use dispatcher::*;
pub use processor::*;
pub use request::*;
pub use worker::*;
