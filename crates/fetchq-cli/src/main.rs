use fetchq_core::logging;

mod cli;

use crate::cli::CliCommand;

fn main() {
    // Log to the state dir; fall back to stderr when it is not writable.
    if let Err(err) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable: {:#}", err);
    }

    if let Err(err) = CliCommand::run_from_args() {
        eprintln!("fetchq error: {:#}", err);
        std::process::exit(1);
    }
}
