//! Error types for starting fetches and driving the transfer engine.

use thiserror::Error;

use crate::engine::TransferId;

/// Failure reported by a transfer engine while creating, configuring or
/// driving a transfer.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("curl: {0}")]
    Curl(#[from] curl::Error),
    #[error("curl multi: {0}")]
    Multi(#[from] curl::MultiError),
    #[error("curl form: {0}")]
    Form(#[from] curl::FormError),
    /// The engine has no transfer with this id (already released).
    #[error("unknown {0}")]
    UnknownTransfer(TransferId),
    /// The transfer is registered with the engine and cannot be reconfigured.
    #[error("{0} is still attached")]
    Attached(TransferId),
    #[error("{0}")]
    Other(String),
}

/// Why [`crate::Scheduler::start`] refused a request. Nothing is registered
/// with the scheduler when this is returned.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("could not set up transfer: {0}")]
    Engine(#[from] EngineError),
}

/// A broken linkage between the active registry and the host queues.
#[derive(Debug, Error)]
#[error("fetch scheduler invariant violated: {0}")]
pub struct InvariantViolation(pub String);
