//! Collaborator interfaces the scheduler consults but does not own:
//! credential lookup, filetype detection for local files, and the message
//! catalog for canned diagnostics. Defaults are provided for each and can be
//! replaced by the embedding application.

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::{FetchqConfig, LoginConfig};

/// Message key for the only-2xx policy rejection.
pub const MSG_NOT_2XX: &str = "Not2xx";

/// Credentials for HTTP authentication, keyed by request URL.
pub trait CredentialStore {
    /// `user:password` to send with a request to `url`, if any.
    fn lookup(&self, url: &str) -> Option<String>;
}

/// MIME type detection for local files (no Content-Type header available).
pub trait FiletypeLookup {
    fn mime_for_path(&self, path: &Path) -> String;
}

/// Canned, possibly localized, diagnostic texts.
pub trait MessageCatalog {
    /// Text for `key`; unknown keys return the key itself.
    fn get(&self, key: &str) -> String;
}

/// The set of collaborators handed to a scheduler.
pub struct Collaborators {
    pub credentials: Box<dyn CredentialStore>,
    pub filetypes: Box<dyn FiletypeLookup>,
    pub messages: Box<dyn MessageCatalog>,
}

impl Collaborators {
    pub fn from_config(cfg: &FetchqConfig) -> Self {
        Self {
            credentials: Box::new(LoginList::from_config(&cfg.logins)),
            filetypes: Box::new(ExtensionFiletypes),
            messages: Box::new(DefaultMessages::with_overrides(cfg.messages.clone())),
        }
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            credentials: Box::new(LoginList::default()),
            filetypes: Box::new(ExtensionFiletypes),
            messages: Box::new(DefaultMessages::default()),
        }
    }
}

/// Credentials stored per host name.
#[derive(Debug, Clone, Default)]
pub struct LoginList {
    entries: Vec<LoginConfig>,
}

impl LoginList {
    pub fn from_config(logins: &[LoginConfig]) -> Self {
        Self {
            entries: logins.to_vec(),
        }
    }

    pub fn add(&mut self, host: &str, credentials: &str) {
        self.entries.push(LoginConfig {
            host: host.to_string(),
            credentials: credentials.to_string(),
        });
    }
}

impl CredentialStore for LoginList {
    fn lookup(&self, url: &str) -> Option<String> {
        let parsed = url::Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        self.entries
            .iter()
            .find(|e| e.host.eq_ignore_ascii_case(host))
            .map(|e| e.credentials.clone())
    }
}

/// Filetype lookup by file extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionFiletypes;

const EXTENSION_TYPES: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("htm", "text/html"),
    ("xhtml", "application/xhtml+xml"),
    ("css", "text/css"),
    ("txt", "text/plain"),
    ("js", "application/javascript"),
    ("json", "application/json"),
    ("xml", "text/xml"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
];

const FALLBACK_TYPE: &str = "application/octet-stream";

impl FiletypeLookup for ExtensionFiletypes {
    fn mime_for_path(&self, path: &Path) -> String {
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(e) => e.to_ascii_lowercase(),
            None => return FALLBACK_TYPE.to_string(),
        };
        EXTENSION_TYPES
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, mime)| mime.to_string())
            .unwrap_or_else(|| FALLBACK_TYPE.to_string())
    }
}

/// Built-in English messages, with optional overrides from config.
#[derive(Debug, Clone, Default)]
pub struct DefaultMessages {
    overrides: BTreeMap<String, String>,
}

impl DefaultMessages {
    pub fn with_overrides(overrides: BTreeMap<String, String>) -> Self {
        Self { overrides }
    }
}

impl MessageCatalog for DefaultMessages {
    fn get(&self, key: &str) -> String {
        if let Some(text) = self.overrides.get(key) {
            return text.clone();
        }
        match key {
            MSG_NOT_2XX => "Server returned an error".to_string(),
            _ => key.to_string(),
        }
    }
}
