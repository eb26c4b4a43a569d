//! Parse the few response headers the scheduler cares about.

use crate::request::ResponseMeta;

/// Records `Location`, `Content-Length` and (when `http_auth` is set)
/// the `WWW-Authenticate` realm from one raw header line. Any other line,
/// including the status line, is ignored.
pub(crate) fn absorb_header(meta: &mut ResponseMeta, line: &[u8], http_auth: bool) {
    let text = String::from_utf8_lossy(line);
    let Some((name, value)) = text.split_once(':') else {
        return;
    };
    let name = name.trim();
    if name.eq_ignore_ascii_case("location") {
        meta.location = Some(clean_location(value));
    } else if name.eq_ignore_ascii_case("content-length") {
        if let Some(n) = leading_digits(value) {
            meta.content_length = n;
        }
    } else if http_auth && name.eq_ignore_ascii_case("www-authenticate") {
        meta.realm = Some(parse_realm(value));
    }
}

fn clean_location(value: &str) -> String {
    value
        .trim_start_matches([' ', '\t'])
        .trim_end_matches(|c: char| c.is_whitespace() || c.is_control())
        .to_string()
}

/// The run of decimal digits the value starts with (after blanks).
fn leading_digits(value: &str) -> Option<u64> {
    let value = value.trim_start_matches([' ', '\t']);
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    if end == 0 {
        return None;
    }
    value[..end].parse().ok()
}

/// Token after the first `=`, unquoted. Empty when there is no `=`.
fn parse_realm(value: &str) -> String {
    let Some((_, rest)) = value.split_once('=') else {
        return String::new();
    };
    let rest = rest.trim_start();
    let token = match rest.strip_prefix('"') {
        Some(quoted) => quoted.split('"').next().unwrap_or(""),
        None => rest
            .split(|c: char| c == ',' || c.is_whitespace())
            .next()
            .unwrap_or(""),
    };
    token.to_string()
}
