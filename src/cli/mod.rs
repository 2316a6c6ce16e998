//! Command line interface module
//!
//! Argument parsing and the runner behind the `image-import` binary.

pub mod args;
pub mod runner;

pub use args::{Args, Command};
pub use runner::{RunOutput, Runner};
