//! Path resolution confined to the media root

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{MediaError, MediaResult};

/// Canonical media root directory
///
/// All user supplied paths are resolved through this type, which guarantees
/// the result never leaves the root.
#[derive(Debug, Clone)]
pub struct MediaRoot {
    root: PathBuf,
}

/// A path known to lie inside the media root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath(PathBuf);

impl ResolvedPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Final component of the path as UTF-8, if any
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name().and_then(|name| name.to_str())
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl MediaRoot {
    /// Open a media root
    ///
    /// # Arguments
    /// * `path` - Existing, readable directory
    ///
    /// # Errors
    /// Fails if the path cannot be canonicalized or is not a directory
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let root = std::fs::canonicalize(path.as_ref())?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            ));
        }
        Ok(Self { root })
    }

    /// Canonical root directory
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Join segments onto the root without touching the filesystem
    ///
    /// Each segment may contain separators. Parent, root and prefix
    /// components are rejected with [`MediaError::Forbidden`].
    pub fn join(&self, segments: &[&str]) -> MediaResult<PathBuf> {
        let mut joined = self.root.clone();
        for segment in segments {
            for component in Path::new(segment).components() {
                match component {
                    Component::Normal(part) => joined.push(part),
                    Component::CurDir => {}
                    Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                        tracing::warn!("Rejected path segment outside media root: {:?}", segment);
                        return Err(MediaError::Forbidden);
                    }
                }
            }
        }
        Ok(joined)
    }

    /// Resolve segments to a path inside the root
    ///
    /// Existing paths are canonicalized so that symlinks pointing outside the
    /// root are caught. Paths that do not exist resolve to their lexical join
    /// and the caller decides what absence means.
    pub async fn resolve(&self, segments: &[&str]) -> MediaResult<ResolvedPath> {
        let joined = self.join(segments)?;
        match tokio::fs::canonicalize(&joined).await {
            Ok(canonical) => self.confine(canonical),
            Err(_) => Ok(ResolvedPath(joined)),
        }
    }

    /// Check that an existing path still lies within the root
    ///
    /// # Errors
    /// [`MediaError::NotFound`] if the path does not exist,
    /// [`MediaError::Forbidden`] if it resolves outside the root
    pub async fn contain(&self, path: &Path) -> MediaResult<ResolvedPath> {
        let canonical = tokio::fs::canonicalize(path)
            .await
            .map_err(MediaError::from_io)?;
        self.confine(canonical)
    }

    fn confine(&self, canonical: PathBuf) -> MediaResult<ResolvedPath> {
        if canonical.starts_with(&self.root) {
            Ok(ResolvedPath(canonical))
        } else {
            tracing::warn!("Path {} resolves outside media root", canonical.display());
            Err(MediaError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, MediaRoot) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("videos/school/math")).unwrap();
        std::fs::write(dir.path().join("videos/school/math/lesson1.mp4"), b"data").unwrap();
        let root = MediaRoot::new(dir.path()).unwrap();
        (dir, root)
    }

    #[test]
    fn test_root_must_be_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, b"x").unwrap();
        assert!(MediaRoot::new(&file).is_err());
        assert!(MediaRoot::new(dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_join_rejects_parent_components() {
        let (_dir, root) = setup();
        assert!(matches!(root.join(&["videos", ".."]), Err(MediaError::Forbidden)));
        assert!(matches!(root.join(&["../etc/passwd"]), Err(MediaError::Forbidden)));
        assert!(matches!(
            root.join(&["videos", "school/../../secret"]),
            Err(MediaError::Forbidden)
        ));
    }

    #[test]
    fn test_join_rejects_absolute_segment() {
        let (_dir, root) = setup();
        assert!(matches!(root.join(&["videos", "/etc/passwd"]), Err(MediaError::Forbidden)));
    }

    #[test]
    fn test_join_accepts_nested_segments() {
        let (_dir, root) = setup();
        let joined = root.join(&["videos", "school/math", "./1/master.m3u8"]).unwrap();
        assert_eq!(joined, root.path().join("videos/school/math/1/master.m3u8"));
    }

    #[tokio::test]
    async fn test_resolve_existing_file() {
        let (_dir, root) = setup();
        let resolved = root
            .resolve(&["videos", "school", "math", "lesson1.mp4"])
            .await
            .unwrap();
        assert!(resolved.as_path().starts_with(root.path()));
        assert_eq!(resolved.file_name(), Some("lesson1.mp4"));
    }

    #[tokio::test]
    async fn test_resolve_missing_file_is_lexical() {
        let (_dir, root) = setup();
        let resolved = root.resolve(&["videos", "nope", "clip.mp4"]).await.unwrap();
        assert_eq!(resolved.as_path(), root.path().join("videos/nope/clip.mp4"));
    }

    #[tokio::test]
    async fn test_resolve_traversal_is_forbidden() {
        let (_dir, root) = setup();
        let result = root.resolve(&["videos", "../../../etc/passwd"]).await;
        assert!(matches!(result, Err(MediaError::Forbidden)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resolve_symlink_escape_is_forbidden() {
        let (dir, root) = setup();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.mp4"), b"secret").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("videos/link")).unwrap();

        let result = root.resolve(&["videos", "link", "secret.mp4"]).await;
        assert!(matches!(result, Err(MediaError::Forbidden)));

        let contained = root.contain(&dir.path().join("videos/link/secret.mp4")).await;
        assert!(matches!(contained, Err(MediaError::Forbidden)));
    }

    #[tokio::test]
    async fn test_contain_missing_is_not_found() {
        let (dir, root) = setup();
        let result = root.contain(&dir.path().join("videos/missing.mp4")).await;
        assert!(matches!(result, Err(MediaError::NotFound)));
    }
}
