use std::fmt;

/// Key used to serialize fetches: at most one transfer per key is in flight.
///
/// Built from the URL authority (host plus effective port) and lower-cased
/// once, so comparisons are case-insensitive. URLs without an authority
/// (`file:`) have no key and are never queued.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostKey(String);

impl HostKey {
    /// Host key for `url`. `Ok(None)` for `file:` URLs; `Err` with a reason
    /// when any other URL lacks a host.
    pub fn from_url(url: &url::Url) -> Result<Option<Self>, String> {
        if url.scheme() == "file" {
            return Ok(None);
        }
        let host = match url.host_str() {
            Some(h) if !h.is_empty() => h,
            _ => return Err(format!("no host in {} URL", url.scheme())),
        };
        let key = match url.port_or_known_default() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        Ok(Some(Self(key.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
