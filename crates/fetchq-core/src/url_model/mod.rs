//! URL helpers used by the scheduler: host keys for per-host queueing,
//! percent-decoding of redirect targets, and local paths for `file:` URLs.

mod host;
mod local;

pub use host::HostKey;
pub use local::local_path;

use percent_encoding::percent_decode_str;

/// Percent-decodes `s` (no `+` to space translation). Invalid UTF-8 in the
/// decoded bytes is replaced rather than rejected.
pub fn unescape(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// True for `http` and `https` (and anything else starting with `http`),
/// the schemes the only-2xx policy applies to.
pub fn is_http_family(url: &url::Url) -> bool {
    url.scheme().starts_with("http")
}
