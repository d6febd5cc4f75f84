//! Filter registry reader and CSV/JSON report.

mod reader;
mod report;

pub use reader::*;
pub use report::*;
