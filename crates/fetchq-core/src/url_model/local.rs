use std::path::PathBuf;

use super::unescape;

/// Local filesystem path named by a `file:` URL, percent-decoded.
/// `None` for any other scheme.
pub fn local_path(url: &url::Url) -> Option<PathBuf> {
    if url.scheme() != "file" {
        return None;
    }
    url.to_file_path()
        .ok()
        .or_else(|| Some(PathBuf::from(unescape(url.path()))))
}
