//! HLS playlist and segment resolution
//!
//! Transcoders disagree on layout: some write segments next to the playlist,
//! some one directory deeper, some produce only a plain `.mp4`. Requests are
//! resolved against whatever is on disk:
//!
//! - `.m3u8` missing: serve the sibling `<stem>.mp4` as progressive video
//! - `.ts` missing: depth-first search of the category directory by file name
//! - `.mp4` missing: not found

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::Path;

use crate::error::{MediaError, MediaResult};
use crate::media::MediaKind;
use crate::path::{MediaRoot, ResolvedPath};

/// Directory levels below the category searched for a missing segment
const MAX_SEARCH_DEPTH: usize = 8;

/// A playlist, segment or video ready to be streamed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HlsAsset {
    pub path: ResolvedPath,
    pub kind: MediaKind,
}

impl HlsAsset {
    pub fn mime_type(&self) -> &'static str {
        self.kind.mime_type()
    }
}

/// Resolve `sub_path` inside the category directory named by `category`
///
/// # Arguments
/// * `root` - Media root
/// * `category` - Segments leading to the category directory, e.g. `["videos", "school", "math"]`
/// * `sub_path` - Requested file below the category, may contain `/`
///
/// # Errors
/// * [`MediaError::UnsupportedType`] - extension is not `.m3u8`, `.ts` or `.mp4`,
///   reported before any filesystem access
/// * [`MediaError::Forbidden`] - the path escapes the media root
/// * [`MediaError::NotFound`] - nothing found after fallbacks
pub async fn resolve_hls(root: &MediaRoot, category: &[&str], sub_path: &str) -> MediaResult<HlsAsset> {
    let kind = match MediaKind::from_path(Path::new(sub_path)) {
        Some(kind @ (MediaKind::Video | MediaKind::HlsPlaylist | MediaKind::HlsSegment)) => kind,
        _ => {
            let ext = Path::new(sub_path)
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Err(MediaError::UnsupportedType(ext));
        }
    };

    let mut segments = category.to_vec();
    segments.push(sub_path);
    let candidate = root.resolve(&segments).await?;

    if is_file(candidate.as_path()).await? {
        return Ok(HlsAsset { path: candidate, kind });
    }

    match kind {
        MediaKind::HlsPlaylist => {
            let sibling = candidate.as_path().with_extension("mp4");
            let path = root.contain(&sibling).await?;
            if !is_file(path.as_path()).await? {
                return Err(MediaError::NotFound);
            }
            tracing::debug!(
                "Playlist {} missing, falling back to {}",
                candidate.as_path().display(),
                path.as_path().display()
            );
            Ok(HlsAsset { path, kind: MediaKind::Video })
        }
        MediaKind::HlsSegment => {
            let file_name = candidate
                .as_path()
                .file_name()
                .ok_or(MediaError::NotFound)?
                .to_os_string();
            let category_dir = root.resolve(category).await?;
            let path = find_file(root, &category_dir, &file_name)
                .await?
                .ok_or(MediaError::NotFound)?;
            tracing::debug!(
                "Segment {} found at {}",
                candidate.as_path().display(),
                path.as_path().display()
            );
            Ok(HlsAsset { path, kind })
        }
        _ => Err(MediaError::NotFound),
    }
}

async fn is_file(path: &Path) -> MediaResult<bool> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Err(MediaError::Io(e)),
        Err(_) => Ok(false),
    }
}

/// Depth-first search below `start` for a regular file called `file_name`
///
/// Directories are visited at most once by canonical path, so symlink
/// cycles terminate. Directories that resolve outside the root and
/// unreadable directories are skipped.
async fn find_file(
    root: &MediaRoot,
    start: &ResolvedPath,
    file_name: &OsStr,
) -> MediaResult<Option<ResolvedPath>> {
    let start = match root.contain(start.as_path()).await {
        Ok(start) => start,
        Err(MediaError::NotFound) => return Ok(None),
        Err(e) => return Err(e),
    };
    let entries = match tokio::fs::read_dir(start.as_path()).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(MediaError::Io(e)),
    };

    let mut visited = HashSet::new();
    visited.insert(start.as_path().to_path_buf());
    let mut stack = vec![(entries, 0usize)];

    while let Some((entries, depth)) = stack.last_mut() {
        let depth = *depth;
        let next = entries.next_entry().await;
        let entry = match next {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                stack.pop();
                continue;
            }
            Err(e) => {
                tracing::warn!("Skipping unreadable directory during segment search: {}", e);
                stack.pop();
                continue;
            }
        };

        let path = entry.path();
        let Ok(metadata) = tokio::fs::metadata(&path).await else {
            continue;
        };

        if metadata.is_dir() {
            if depth + 1 > MAX_SEARCH_DEPTH {
                continue;
            }
            let Ok(dir) = root.contain(&path).await else {
                continue;
            };
            if !visited.insert(dir.as_path().to_path_buf()) {
                continue;
            }
            match tokio::fs::read_dir(dir.as_path()).await {
                Ok(child) => stack.push((child, depth + 1)),
                Err(e) => tracing::warn!("Cannot read {}: {}", dir.as_path().display(), e),
            }
        } else if metadata.is_file() && entry.file_name() == file_name {
            if let Ok(found) = root.contain(&path).await {
                return Ok(Some(found));
            }
        }
    }

    Ok(None)
}
