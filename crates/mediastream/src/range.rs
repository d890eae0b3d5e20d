//! `Range` header parsing

use axum::http::HeaderValue;

use crate::error::{MediaError, MediaResult};

/// Inclusive byte interval within a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered by the range
    pub fn content_length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Content-Range` header
    pub fn content_range(&self, total_size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total_size)
    }
}

/// Parse a `Range` header against a file of `total_size` bytes
///
/// Only the single-range forms `bytes=<start>-<end>` and `bytes=<start>-`
/// are accepted. An end past the file is clamped to the last byte.
///
/// # Returns
/// * `Ok(None)` - no header, serve the whole file
/// * `Ok(Some(range))` - a satisfiable range
/// * `Err(MediaError::MalformedRange)` - anything else
pub fn parse_range(header: Option<&HeaderValue>, total_size: u64) -> MediaResult<Option<ByteRange>> {
    let Some(header) = header else {
        return Ok(None);
    };
    let malformed = || MediaError::MalformedRange { size: total_size };

    let range_str = header.to_str().map_err(|_| malformed())?.trim();
    let range_str = range_str.strip_prefix("bytes=").ok_or_else(malformed)?;

    let (start, end) = range_str.split_once('-').ok_or_else(malformed)?;
    let (start, end) = (start.trim(), end.trim());

    // Suffix ranges are not supported
    if start.is_empty() {
        return Err(malformed());
    }
    let start: u64 = start.parse().map_err(|_| malformed())?;

    if total_size == 0 || start >= total_size {
        return Err(malformed());
    }

    let end = if end.is_empty() {
        total_size - 1
    } else {
        end.parse::<u64>().map_err(|_| malformed())?.min(total_size - 1)
    };

    if start > end {
        return Err(malformed());
    }

    Ok(Some(ByteRange { start, end }))
}
