//! Office suite conversion: service abstraction, pipeline and converter launch.

mod acceptor;
mod launcher;
mod pipeline;
mod service;

pub use acceptor::*;
pub use launcher::*;
pub use pipeline::*;
pub use service::*;
