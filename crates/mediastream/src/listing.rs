//! Directory listings

use std::io::ErrorKind;
use std::path::Path;

use crate::error::{MediaError, MediaResult};
use crate::path::ResolvedPath;

/// Which entries a listing keeps
#[derive(Debug, Clone, Copy, Default)]
pub struct ListFilter {
    /// Keep only files with this extension, compared case-insensitively
    pub extension: Option<&'static str>,
    /// Keep only subdirectories
    pub only_directories: bool,
}

impl ListFilter {
    pub fn extension(extension: &'static str) -> Self {
        Self {
            extension: Some(extension),
            only_directories: false,
        }
    }

    pub fn directories() -> Self {
        Self {
            extension: None,
            only_directories: true,
        }
    }
}

/// List the names of the immediate children of `path`
///
/// A directory that does not exist yet lists as empty, as does a plain file
/// or a path below one. Names come back in
/// whatever order the filesystem yields them; no sorting is applied.
///
/// # Errors
/// [`MediaError::Io`] if the directory exists but cannot be read
pub async fn list_dir(path: &ResolvedPath, filter: ListFilter) -> MediaResult<Vec<String>> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => {}
        Ok(_) => return Ok(Vec::new()),
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            return Ok(Vec::new())
        }
        Err(e) => return Err(MediaError::Io(e)),
    }

    let mut entries = tokio::fs::read_dir(path).await?;
    let mut names = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();

        if filter.only_directories || filter.extension.is_some() {
            // Follow symlinks so linked directories and files list as their targets
            let metadata = match tokio::fs::metadata(entry.path()).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::debug!("Skipping dangling entry {}: {}", name, e);
                    continue;
                }
            };
            if filter.only_directories && !metadata.is_dir() {
                continue;
            }
            if let Some(ext) = filter.extension {
                if !metadata.is_file() || !has_extension(&name, ext) {
                    continue;
                }
            }
        }

        names.push(name);
    }

    Ok(names)
}

fn has_extension(name: &str, ext: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}
