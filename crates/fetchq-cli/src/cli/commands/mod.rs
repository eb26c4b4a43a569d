//! CLI command handlers, one per file.

mod completions;
mod config;
mod get;

pub use completions::{run_completions, run_man};
pub use config::run_config;
pub use get::run_get;
