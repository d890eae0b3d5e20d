//! Error types shared by the resolver, lister and streamer

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

/// Failure kinds of the media core
///
/// Every variant maps to exactly one HTTP status at the request boundary.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// The requested path escapes the media root
    #[error("path escapes the media root")]
    Forbidden,
    /// The asset does not exist, including after every fallback
    #[error("file not found")]
    NotFound,
    /// Extension not servable on an HLS sub-path
    #[error("unsupported media type: {0}")]
    UnsupportedType(String),
    /// Range header that cannot be parsed or lies outside the file
    #[error("range not satisfiable, file size: {size}")]
    MalformedRange { size: u64 },
    /// Any other filesystem failure
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Map an I/O error, turning a missing file into [`MediaError::NotFound`]
    pub fn from_io(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            MediaError::NotFound
        } else {
            MediaError::Io(err)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            MediaError::Forbidden => StatusCode::FORBIDDEN,
            MediaError::NotFound => StatusCode::NOT_FOUND,
            MediaError::UnsupportedType(_) => StatusCode::BAD_REQUEST,
            MediaError::MalformedRange { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            MediaError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MediaError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            MediaError::Io(err) => {
                tracing::error!("I/O failure while serving media: {}", err);
                (status, "Internal server error.").into_response()
            }
            MediaError::MalformedRange { size } => (
                status,
                [(header::CONTENT_RANGE, format!("bytes */{}", size))],
                format!("Range not satisfiable. File size: {}", size),
            )
                .into_response(),
            MediaError::Forbidden => (status, "Access Denied.").into_response(),
            MediaError::NotFound => (status, "File not found.").into_response(),
            MediaError::UnsupportedType(ext) => {
                (status, format!("Unsupported file type: {}", ext)).into_response()
            }
        }
    }
}

/// Result type alias for media operations
pub type MediaResult<T> = std::result::Result<T, MediaError>;
