//! Media asset kinds and their content types
//!
//! Game bundles are directories handed to a static file service and have no
//! kind of their own here.

use std::path::Path;

/// Kind of asset served from the media root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Progressive download video (`.mp4`)
    Video,
    /// PDF document
    Pdf,
    /// HLS transport stream segment (`.ts`)
    HlsSegment,
    /// HLS manifest (`.m3u8`)
    HlsPlaylist,
}

impl MediaKind {
    /// Classify a streamable file by extension, case-insensitively
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp4" => Some(MediaKind::Video),
            "pdf" => Some(MediaKind::Pdf),
            "ts" => Some(MediaKind::HlsSegment),
            "m3u8" => Some(MediaKind::HlsPlaylist),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaKind::Video => "video/mp4",
            MediaKind::Pdf => "application/pdf",
            MediaKind::HlsSegment => "video/mp2t",
            MediaKind::HlsPlaylist => "application/vnd.apple.mpegurl",
        }
    }
}
