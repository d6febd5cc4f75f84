//! Office Relay - supervised office-suite conversions with live output relay.

pub mod config;
pub mod display;
pub mod office;
pub mod process;
pub mod registry;
pub mod retry;
