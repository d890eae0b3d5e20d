//! Byte range streaming of files from disk

use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use futures::Stream;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, Take};
use tokio_util::io::ReaderStream;

use crate::error::{MediaError, MediaResult};
use crate::path::ResolvedPath;
use crate::range::parse_range;

/// Read buffer size for streamed bodies
const CHUNK_SIZE: usize = 64 * 1024;

/// Stream a file, honoring an optional `Range` header
///
/// The file is opened once and its size taken from the open handle, so a
/// file that disappears before this point yields [`MediaError::NotFound`].
/// Once the response is returned its status is fixed; later read failures
/// abort the body instead.
///
/// # Arguments
/// * `path` - File to serve
/// * `range_header` - Raw `Range` header, if the client sent one
/// * `content_type` - Value for `Content-Type`
pub async fn stream_file(
    path: &ResolvedPath,
    range_header: Option<&HeaderValue>,
    content_type: &str,
) -> MediaResult<Response> {
    let mut file = File::open(path).await.map_err(MediaError::from_io)?;
    let metadata = file.metadata().await.map_err(MediaError::from_io)?;
    if !metadata.is_file() {
        return Err(MediaError::NotFound);
    }
    let file_size = metadata.len();

    let Some(range) = parse_range(range_header, file_size)? else {
        tracing::debug!("Serving {} in full ({} bytes)", path.as_path().display(), file_size);
        let body = FileBodyStream::new(file, path.as_path().into(), file_size);
        return build_response(
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, file_size)
                .header(header::ACCEPT_RANGES, "bytes"),
            body,
        );
    };

    file.seek(io::SeekFrom::Start(range.start)).await?;
    let content_length = range.content_length();
    tracing::debug!(
        "Serving {} range {}-{} of {}",
        path.as_path().display(),
        range.start,
        range.end,
        file_size
    );

    let body = FileBodyStream::new(file, path.as_path().into(), content_length);
    build_response(
        Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, content_length)
            .header(header::CONTENT_RANGE, range.content_range(file_size))
            .header(header::ACCEPT_RANGES, "bytes"),
        body,
    )
}

fn build_response(builder: axum::http::response::Builder, body: FileBodyStream) -> MediaResult<Response> {
    builder
        .body(Body::from_stream(body))
        .map_err(|e| MediaError::Io(io::Error::new(io::ErrorKind::InvalidInput, e)))
}

/// Response body reading a bounded window of an open file
///
/// The file handle is owned by the stream, so it is released whenever the
/// body is dropped: after the last chunk, after an error, or when the client
/// goes away and the HTTP stack discards the body.
pub struct FileBodyStream {
    inner: ReaderStream<Take<File>>,
    path: PathBuf,
    remaining: u64,
    finished: bool,
}

impl FileBodyStream {
    /// Wrap `file`, positioned at the first byte to send, yielding `len` bytes
    pub fn new(file: File, path: PathBuf, len: u64) -> Self {
        Self {
            inner: ReaderStream::with_capacity(file.take(len), CHUNK_SIZE),
            path,
            remaining: len,
            finished: false,
        }
    }
}

impl Stream for FileBodyStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        match ready!(Pin::new(&mut self.inner).poll_next(cx)) {
            Some(Ok(chunk)) => {
                self.remaining = self.remaining.saturating_sub(chunk.len() as u64);
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(err)) => {
                self.finished = true;
                tracing::error!(
                    "Read failed mid-stream for {}: {}, aborting response",
                    self.path.display(),
                    err
                );
                Poll::Ready(Some(Err(err)))
            }
            None if self.remaining > 0 => {
                self.finished = true;
                tracing::error!(
                    "File {} ended {} bytes early, aborting response",
                    self.path.display(),
                    self.remaining
                );
                Poll::Ready(Some(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "file shorter than announced content length",
                ))))
            }
            None => {
                self.finished = true;
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for FileBodyStream {
    fn drop(&mut self) {
        if !self.finished && self.remaining > 0 {
            tracing::debug!(
                "Stream of {} dropped with {} bytes unsent, closing file",
                self.path.display(),
                self.remaining
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::MediaRoot;
    use futures::StreamExt;

    async fn fixture(len: usize) -> (tempfile::TempDir, ResolvedPath, Vec<u8>) {
        let dir = tempfile::tempdir().unwrap();
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        std::fs::write(dir.path().join("clip.mp4"), &data).unwrap();
        let root = MediaRoot::new(dir.path()).unwrap();
        let path = root.resolve(&["clip.mp4"]).await.unwrap();
        (dir, path, data)
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_full_file() {
        let (_dir, path, data) = fixture(200_000).await;
        let response = stream_file(&path, None, "video/mp4").await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "200000");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
        assert!(response.headers().get(header::CONTENT_RANGE).is_none());
        assert_eq!(body_bytes(response).await, data);
    }

    #[tokio::test]
    async fn test_partial_content() {
        let (_dir, path, data) = fixture(10_000).await;
        let range = HeaderValue::from_static("bytes=100-1099");
        let response = stream_file(&path, Some(&range), "video/mp4").await.unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "1000");
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 100-1099/10000");
        assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
        assert_eq!(body_bytes(response).await, &data[100..1100]);
    }

    #[tokio::test]
    async fn test_every_window_has_exact_length() {
        let (_dir, path, data) = fixture(300).await;
        for (start, end) in [(0u64, 0u64), (0, 299), (17, 42), (299, 299), (150, 299)] {
            let value = HeaderValue::from_str(&format!("bytes={}-{}", start, end)).unwrap();
            let response = stream_file(&path, Some(&value), "video/mp4").await.unwrap();
            assert_eq!(
                response.headers()[header::CONTENT_RANGE],
                format!("bytes {}-{}/300", start, end).as_str()
            );
            let body = body_bytes(response).await;
            assert_eq!(body.len() as u64, end - start + 1);
            assert_eq!(body, &data[start as usize..=end as usize]);
        }
    }

    #[tokio::test]
    async fn test_repeated_requests_are_identical() {
        let (_dir, path, _data) = fixture(5_000).await;
        let range = HeaderValue::from_static("bytes=1234-4321");
        let first = body_bytes(stream_file(&path, Some(&range), "video/mp4").await.unwrap()).await;
        let second = body_bytes(stream_file(&path, Some(&range), "video/mp4").await.unwrap()).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_unsatisfiable_range() {
        let (_dir, path, _data) = fixture(100).await;
        let range = HeaderValue::from_static("bytes=100-200");
        let result = stream_file(&path, Some(&range), "video/mp4").await;
        assert!(matches!(result, Err(MediaError::MalformedRange { size: 100 })));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let (dir, _path, _data) = fixture(10).await;
        let root = MediaRoot::new(dir.path()).unwrap();
        let missing = root.resolve(&["gone.mp4"]).await.unwrap();
        let result = stream_file(&missing, None, "video/mp4").await;
        assert!(matches!(result, Err(MediaError::NotFound)));
    }

    #[tokio::test]
    async fn test_directory_is_not_streamed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("folder")).unwrap();
        let root = MediaRoot::new(dir.path()).unwrap();
        let folder = root.resolve(&["folder"]).await.unwrap();
        let result = stream_file(&folder, None, "video/mp4").await;
        assert!(matches!(result, Err(MediaError::NotFound)));
    }

    #[tokio::test]
    async fn test_truncated_file_aborts_body() {
        let (_dir, path, _data) = fixture(10).await;
        let file = File::open(&path).await.unwrap();
        let stream = FileBodyStream::new(file, path.as_path().into(), 20);

        let items: Vec<io::Result<Bytes>> = stream.collect().await;
        let last = items.last().unwrap();
        assert_eq!(last.as_ref().unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
        let sent: usize = items.iter().filter_map(|i| i.as_ref().ok()).map(|b| b.len()).sum();
        assert_eq!(sent, 10);
    }

    #[tokio::test]
    async fn test_dropped_stream_stops_early() {
        let (_dir, path, _data) = fixture(CHUNK_SIZE * 3).await;
        let file = File::open(&path).await.unwrap();
        let mut stream = FileBodyStream::new(file, path.as_path().into(), (CHUNK_SIZE * 3) as u64);

        let first = stream.next().await.unwrap().unwrap();
        assert!(!first.is_empty());
        assert!(stream.remaining > 0);
        drop(stream);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_dropped_stream_closes_file() {
        use std::os::fd::AsRawFd;

        let (_dir, path, _data) = fixture(CHUNK_SIZE * 3).await;
        let file = File::open(&path).await.unwrap();
        let fd_link = format!("/proc/self/fd/{}", file.as_raw_fd());
        let mut stream = FileBodyStream::new(file, path.as_path().into(), (CHUNK_SIZE * 3) as u64);

        stream.next().await.unwrap().unwrap();
        assert_eq!(std::fs::read_link(&fd_link).unwrap(), path.as_path());

        drop(stream);
        // The descriptor is either gone or reused by an unrelated file
        match std::fs::read_link(&fd_link) {
            Ok(target) => assert_ne!(target, path.as_path()),
            Err(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
        }
    }
}
