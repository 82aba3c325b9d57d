//! Report payload validation.
//!
//! The portal answers a request for a missing report with an HTML error
//! page rather than a 404, so every response (and every cached file) is
//! sniffed before it is trusted.

use std::path::Path;

/// OLE2 compound document signature (legacy `.doc`).
const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

/// Bytes inspected for HTML error-page markers.
const SNIFF_LEN: usize = 256;

/// Payloads this size or smaller are treated as empty responses.
pub const MIN_DOCUMENT_BYTES: usize = 100;

/// What a downloaded payload turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// A report document worth keeping.
    Document,
    /// The portal's error page: there is no report for this system and year.
    NotAvailable,
    /// Empty or truncated response.
    Empty,
}

/// Classifies a payload.
#[must_use]
pub fn classify(bytes: &[u8]) -> PayloadKind {
    if bytes.len() <= MIN_DOCUMENT_BYTES {
        return PayloadKind::Empty;
    }
    if bytes.starts_with(OLE2_MAGIC) {
        return PayloadKind::Document;
    }
    let head = bytes[..bytes.len().min(SNIFF_LEN)].to_ascii_lowercase();
    if contains(&head, b"<!doctype") || contains(&head, b"<html") || contains(&head, b"page not found")
    {
        return PayloadKind::NotAvailable;
    }
    PayloadKind::Document
}

/// Whether a previously downloaded file can be reused.
#[must_use]
pub fn is_valid_cached_file(path: &Path) -> bool {
    std::fs::read(path).is_ok_and(|bytes| classify(&bytes) == PayloadKind::Document)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
