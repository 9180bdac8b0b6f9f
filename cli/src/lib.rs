//! CLI utilities for ernerf.
//!
//! This crate provides options file handling, directory layout and output
//! formatting shared by the command line tools.

pub mod config;
pub mod output;
pub mod paths;

pub use config::{load_config, save_config, Config};
pub use output::{print_success, Output, OutputFormat};
pub use paths::Paths;
