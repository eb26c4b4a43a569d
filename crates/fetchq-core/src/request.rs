//! Request records and the event protocol delivered to fetch callbacks.

use std::fmt;

use crate::engine::TransferId;
use crate::registry::Links;
use crate::url_model::HostKey;

/// One named field of a multipart form body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub value: String,
}

impl FormField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Request body: either a pre-encoded `application/x-www-form-urlencoded`
/// string or an ordered list of multipart form fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    UrlEncoded(String),
    Multipart(Vec<FormField>),
}

/// What the caller asks [`crate::Scheduler::start`] to fetch.
#[derive(Debug, Clone)]
pub struct FetchSpec {
    pub url: String,
    pub referer: Option<String>,
    /// Treat any non-2xx status of an `http*` URL as an error.
    pub only_2xx: bool,
    pub body: Option<RequestBody>,
    /// Read and write the configured cookie jar for this request.
    pub cookies: bool,
}

impl FetchSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            referer: None,
            only_2xx: false,
            body: None,
            cookies: false,
        }
    }

    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn only_2xx(mut self, only_2xx: bool) -> Self {
        self.only_2xx = only_2xx;
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn cookies(mut self, cookies: bool) -> Self {
        self.cookies = cookies;
        self
    }
}

/// Progress notification for one fetch.
///
/// An accepted response produces `Type`, then zero or more `Data`, then
/// `Finished` or `Error`. `Redirect`, `Auth` and policy `Error` replace that
/// whole sequence. Each fetch gets exactly one terminal event unless it is
/// aborted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchEvent<'a> {
    /// MIME type and announced length (0 when unknown).
    Type { mime: &'a str, content_length: u64 },
    /// A chunk of the body, valid only for the duration of the callback.
    Data(&'a [u8]),
    Finished,
    /// Human-readable diagnostic.
    Error(&'a str),
    /// Decoded redirect target.
    Redirect(&'a str),
    /// Authentication challenge; the realm may be empty.
    Auth { realm: &'a str },
}

impl FetchEvent<'_> {
    /// Whether no further events follow this one for the same fetch.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FetchEvent::Type { .. } | FetchEvent::Data(_))
    }
}

impl fmt::Display for FetchEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchEvent::Type {
                mime,
                content_length,
            } => write!(f, "TYPE '{}' {}", mime, content_length),
            FetchEvent::Data(chunk) => write!(f, "DATA {}", chunk.len()),
            FetchEvent::Finished => f.write_str("FINISHED"),
            FetchEvent::Error(msg) => write!(f, "ERROR '{}'", msg),
            FetchEvent::Redirect(target) => write!(f, "REDIRECT '{}'", target),
            FetchEvent::Auth { realm } => write!(f, "AUTH '{}'", realm),
        }
    }
}

/// Where a fetch is in status resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Status not yet resolved.
    Running,
    /// TYPE delivered; body follows.
    Accepted,
    /// Redirect, auth challenge or policy error delivered; the transfer is
    /// being cancelled and any further data is dropped.
    Rejected,
}

/// Callback execution state, driven only by `Scheduler::deliver`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecState {
    Idle,
    InCallback,
    /// `abort` was called from the fetch's own callback.
    PendingAbort,
}

/// Response headers captured before status resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ResponseMeta {
    pub location: Option<String>,
    pub content_length: u64,
    pub realm: Option<String>,
}

/// Scheduler-side record of one fetch.
#[derive(Debug)]
pub(crate) struct FetchRequest {
    pub url: url::Url,
    pub referer: Option<String>,
    pub host: Option<HostKey>,
    pub only_2xx: bool,
    pub cookies: bool,
    pub body: Option<RequestBody>,
    /// Present exactly while this fetch heads its host queue.
    pub transfer: Option<TransferId>,
    pub meta: ResponseMeta,
    pub phase: Phase,
    pub exec: ExecState,
    pub links: Links,
}

impl FetchRequest {
    pub fn new(spec: FetchSpec, url: url::Url, host: Option<HostKey>) -> Self {
        Self {
            url,
            referer: spec.referer,
            host,
            only_2xx: spec.only_2xx,
            cookies: spec.cookies,
            body: spec.body,
            transfer: None,
            meta: ResponseMeta::default(),
            phase: Phase::Running,
            exec: ExecState::Idle,
            links: Links::default(),
        }
    }
}
