//! Command-line interface for embedsniff.

mod commands;
pub mod icons;

pub use commands::{is_verbose, run};
