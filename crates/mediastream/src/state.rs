//! Shared, read-only server state

use std::path::Path;
use std::sync::Arc;

use crate::auth::AccessGate;
use crate::config::{AuthScope, ServerConfig, VideoLayout};
use crate::path::MediaRoot;

/// Directory under the media root holding videos
pub const VIDEOS_DIR: &str = "videos";
/// Directory under the media root holding PDFs
pub const PDFS_DIR: &str = "pdfs";
/// Directory under the media root holding game bundles
pub const GAMES_DIR: &str = "games";

/// State handed to every request handler
///
/// Nothing here is mutated after startup, so requests never coordinate.
#[derive(Clone)]
pub struct ServerState {
    inner: Arc<Inner>,
}

struct Inner {
    root: MediaRoot,
    video_layout: VideoLayout,
    auth_scope: AuthScope,
    gate: Option<Arc<AccessGate>>,
}

impl ServerState {
    /// Create new server state
    ///
    /// # Arguments
    /// * `root` - Media root directory
    /// * `video_layout` - Flat or hierarchical video listing
    /// * `gate` - Access gate, `None` leaves every route open
    /// * `auth_scope` - Routes the gate covers
    pub fn new(
        root: MediaRoot,
        video_layout: VideoLayout,
        gate: Option<AccessGate>,
        auth_scope: AuthScope,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                root,
                video_layout,
                auth_scope,
                gate: gate.map(Arc::new),
            }),
        }
    }

    /// Build state from configuration
    ///
    /// # Errors
    /// Fails if the media directory does not exist or is not a directory
    pub fn from_config(config: &ServerConfig) -> std::io::Result<Self> {
        let root = MediaRoot::new(&config.media_dir)?;
        let gate = config.jwt_secret.as_deref().map(AccessGate::new);
        Ok(Self::new(root, config.video_layout, gate, config.auth_scope))
    }

    pub fn root(&self) -> &MediaRoot {
        &self.inner.root
    }

    /// Canonical media root path
    pub fn media_dir(&self) -> &Path {
        self.inner.root.path()
    }

    pub fn video_layout(&self) -> VideoLayout {
        self.inner.video_layout
    }

    pub fn auth_scope(&self) -> AuthScope {
        self.inner.auth_scope
    }

    /// Access gate, if token verification is enabled
    pub fn gate(&self) -> Option<Arc<AccessGate>> {
        self.inner.gate.clone()
    }
}
