//! Transfer engine seam.
//!
//! The scheduler never touches sockets itself. It hands configured transfers
//! to a [`TransferEngine`], drives it with [`TransferEngine::perform`], and
//! reads back an ordered stream of [`EngineNotice`]s. The production engine
//! is [`CurlEngine`] (libcurl multi interface).

mod curl_multi;

pub use self::curl_multi::CurlEngine;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::EngineError;
use crate::request::RequestBody;

/// Engine-owned transfer handle. A handle outlives the fetch that created it
/// when it is reused for the next fetch queued on the same host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(pub usize);

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transfer#{}", self.0)
    }
}

/// Request headers that suppress engine defaults (`Accept`, `Pragma`).
pub const SUPPRESSED_DEFAULT_HEADERS: &[&str] = &["Accept:", "Pragma:"];

/// Full description of one transfer. Applying it resets everything a
/// previous fetch configured on the same handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    pub url: String,
    pub referer: Option<String>,
    pub user_agent: String,
    /// Raw header lines; `Name:` with no value removes an engine default.
    pub headers: Vec<String>,
    pub proxy: Option<(String, u16)>,
    /// `user:password` for HTTP authentication.
    pub credentials: Option<String>,
    pub body: Option<RequestBody>,
    /// Cookie file to read from and persist to.
    pub cookie_jar: Option<PathBuf>,
    pub connect_timeout: Duration,
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    pub verbose: bool,
}

/// How a transfer ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed,
    /// Ended because the scheduler called [`TransferEngine::cancel`]. Engines
    /// never report this for any other reason.
    Cancelled,
    /// Transport failure with the engine's diagnostic text.
    Failed(String),
}

/// Something that happened on a transfer during [`TransferEngine::perform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineNotice {
    /// One raw response header line, status line included.
    Header { transfer: TransferId, line: Vec<u8> },
    /// A chunk of response body.
    Data { transfer: TransferId, chunk: Vec<u8> },
    /// Last notice for the transfer until it is attached again.
    Done {
        transfer: TransferId,
        outcome: TransferOutcome,
    },
}

impl EngineNotice {
    pub fn transfer(&self) -> TransferId {
        match self {
            EngineNotice::Header { transfer, .. }
            | EngineNotice::Data { transfer, .. }
            | EngineNotice::Done { transfer, .. } => *transfer,
        }
    }
}

/// Non-blocking multiplexing transfer engine.
///
/// Lifecycle of a handle: `create` → `configure` → `attach` → notices →
/// `detach` → (`configure` → `attach` again, or `release`).
pub trait TransferEngine {
    /// Allocates a fresh, unattached transfer handle.
    fn create(&mut self) -> Result<TransferId, EngineError>;

    /// Applies `config` to an unattached handle, replacing any previous
    /// configuration while keeping live connections.
    fn configure(&mut self, transfer: TransferId, config: &TransferConfig)
        -> Result<(), EngineError>;

    /// Registers a configured handle so `perform` starts moving it.
    fn attach(&mut self, transfer: TransferId) -> Result<(), EngineError>;

    /// Unregisters a handle and discards its undelivered notices.
    /// No-op for a handle that is not attached.
    fn detach(&mut self, transfer: TransferId) -> Result<(), EngineError>;

    /// Frees a handle. Unknown handles are ignored.
    fn release(&mut self, transfer: TransferId);

    /// Stops an attached transfer. Its undelivered notices are dropped and
    /// exactly one `Done` with [`TransferOutcome::Cancelled`] is queued.
    fn cancel(&mut self, transfer: TransferId);

    /// One non-blocking step. `Ok(true)` asks the caller to step again
    /// before reading notices.
    fn perform(&mut self) -> Result<bool, EngineError>;

    /// Next queued notice. Notices of one transfer keep the order the engine
    /// observed them in, and its `Done` comes last.
    fn next_notice(&mut self) -> Option<EngineNotice>;

    /// Response status of the latest response on `transfer` (0 if none).
    fn status(&self, transfer: TransferId) -> u32;

    /// Content-Type of the latest response on `transfer`.
    fn content_type(&self, transfer: TransferId) -> Option<String>;

    /// Blocks until there is socket activity or `timeout` elapses.
    fn wait(&mut self, timeout: Duration) -> Result<(), EngineError>;
}
