//! Process supervision: launching, stream relay and exit reporting.

mod launch;
mod relay;
mod supervisor;

pub use launch::*;
pub use relay::{RelayedLine, StreamOrigin};
pub use supervisor::*;
