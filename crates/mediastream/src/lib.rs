//! HTTP media server for videos, PDFs and game bundles
//!
//! This crate serves files from a media root directory with byte range
//! support for video seeking, HLS playlist and segment resolution with
//! fallbacks, directory listings and an optional bearer token gate.

mod auth;
mod config;
mod error;
mod hls;
mod listing;
mod media;
mod path;
mod range;
mod server;
mod state;
mod stream;

pub use auth::{AccessGate, AuthError, Claims};
pub use config::{AuthScope, ConfigError, LogFormat, ServerConfig, VideoLayout};
pub use error::{MediaError, MediaResult};
pub use hls::{resolve_hls, HlsAsset};
pub use listing::{list_dir, ListFilter};
pub use media::MediaKind;
pub use path::{MediaRoot, ResolvedPath};
pub use range::{parse_range, ByteRange};
pub use server::MediaServerApi;
pub use state::ServerState;
pub use stream::{stream_file, FileBodyStream};

/// Result type alias for server operations
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
