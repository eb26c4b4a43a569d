//! Per-host queued fetch scheduler.
//!
//! Requests are started against a [`scheduler::Scheduler`], which keeps at most
//! one transfer per host in flight, queues the rest in FIFO order, and reports
//! progress through a small ordered event protocol delivered from
//! [`scheduler::Scheduler::poll`].

pub mod collab;
pub mod config;
pub mod logging;

pub mod engine;
pub mod error;
pub(crate) mod intake;
pub mod registry;
pub mod request;
pub mod scheduler;
pub mod url_model;

pub use engine::{CurlEngine, TransferEngine};
pub use error::{EngineError, InvariantViolation, StartError};
pub use registry::FetchId;
pub use request::{FetchEvent, FetchSpec, FormField, RequestBody};
pub use scheduler::{FetchCallback, Scheduler};
