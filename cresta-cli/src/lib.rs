//! Command-line drivers for the cresta prominence engine.

pub mod cli;
pub mod flt;
pub mod logging;
