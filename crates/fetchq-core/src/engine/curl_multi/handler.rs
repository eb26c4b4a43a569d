//! Easy2 Handler for one transfer in the curl multi engine.
//! Buffers header lines and body chunks until the engine drains them after
//! `perform`, and tracks the status and Content-Type of the latest response.

use std::str;

/// Header line or body chunk captured during `perform`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Captured {
    Header(Vec<u8>),
    Data(Vec<u8>),
}

#[derive(Debug, Default)]
pub struct Collector {
    pub(super) captured: Vec<Captured>,
    pub(super) status: u32,
    pub(super) content_type: Option<String>,
}

impl Collector {
    /// Clears per-response state before the handle is reused.
    pub(super) fn reset(&mut self) {
        self.captured.clear();
        self.status = 0;
        self.content_type = None;
    }

    pub(super) fn take_captured(&mut self) -> Vec<Captured> {
        std::mem::take(&mut self.captured)
    }
}

/// Status code from an `HTTP/x y reason` line.
pub(super) fn parse_status_line(line: &str) -> Option<u32> {
    line.split_whitespace().nth(1)?.parse().ok()
}

impl curl::easy::Handler for Collector {
    fn header(&mut self, data: &[u8]) -> bool {
        if let Ok(s) = str::from_utf8(data) {
            let line = s.trim_end();
            if line.starts_with("HTTP/") {
                // A new response (after 1xx or an auth round) starts over.
                self.status = parse_status_line(line).unwrap_or(0);
                self.content_type = None;
            } else if let Some((name, value)) = line.split_once(':') {
                let value = value.trim();
                if name.trim().eq_ignore_ascii_case("content-type") && !value.is_empty() {
                    self.content_type = Some(value.to_string());
                }
            }
        }
        self.captured.push(Captured::Header(data.to_vec()));
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, curl::easy::WriteError> {
        self.captured.push(Captured::Data(data.to_vec()));
        Ok(data.len())
    }
}
