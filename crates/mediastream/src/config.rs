//! Server configuration loaded from the environment

use std::path::PathBuf;
use std::str::FromStr;

/// Default bind host
const DEFAULT_HOST: &str = "0.0.0.0";
/// Default bind port
const DEFAULT_PORT: u16 = 8080;

/// How the `videos` directory is organised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoLayout {
    /// `activity/category/file`
    #[default]
    Hierarchical,
    /// Video files directly under `videos`
    Flat,
}

impl FromStr for VideoLayout {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hierarchical" => Ok(VideoLayout::Hierarchical),
            "flat" => Ok(VideoLayout::Flat),
            other => Err(ConfigError::Invalid("VIDEO_LAYOUT", other.to_string())),
        }
    }
}

/// Which routes the access gate covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScope {
    /// Streaming and static asset routes only
    #[default]
    Streams,
    /// Listings as well
    All,
}

impl FromStr for AuthScope {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "streams" => Ok(AuthScope::Streams),
            "all" => Ok(AuthScope::All),
            other => Err(ConfigError::Invalid("AUTH_SCOPE", other.to_string())),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::Invalid("LOG_FORMAT", other.to_string())),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    Missing(&'static str),
    #[error("invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

/// Everything the server needs to start
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub media_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub jwt_secret: Option<String>,
    pub auth_scope: AuthScope,
    pub video_layout: VideoLayout,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Create a configuration with defaults for everything but the media root
    pub fn new(media_dir: impl Into<PathBuf>) -> Self {
        Self {
            media_dir: media_dir.into(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_allowed_origins: Vec::new(),
            jwt_secret: None,
            auth_scope: AuthScope::default(),
            video_layout: VideoLayout::default(),
            log_format: LogFormat::default(),
        }
    }

    /// Load configuration from process environment variables
    ///
    /// Call `dotenv::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let media_dir = var("MEDIA_DIR").ok_or(ConfigError::Missing("MEDIA_DIR"))?;
        let mut config = Self::new(media_dir);

        if let Some(host) = var("HOST") {
            config.host = host;
        }
        if let Some(port) = var("PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("PORT", port))?;
        }
        if let Some(origins) = var("CORS_ALLOWED_ORIGINS") {
            config.cors_allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect();
        }
        config.jwt_secret = var("JWT_SECRET");
        if let Some(scope) = var("AUTH_SCOPE") {
            config.auth_scope = scope.parse()?;
        }
        if let Some(layout) = var("VIDEO_LAYOUT") {
            config.video_layout = layout.parse()?;
        }
        if let Some(format) = var("LOG_FORMAT") {
            config.log_format = format.parse()?;
        }

        Ok(config)
    }

    /// Address to bind, e.g. `0.0.0.0:8080`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_media_dir_required() {
        assert!(matches!(load(&[]), Err(ConfigError::Missing("MEDIA_DIR"))));
        assert!(matches!(load(&[("MEDIA_DIR", "  ")]), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("MEDIA_DIR", "/srv/media")]).unwrap();
        assert_eq!(config.media_dir, PathBuf::from("/srv/media"));
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert!(config.cors_allowed_origins.is_empty());
        assert!(config.jwt_secret.is_none());
        assert_eq!(config.auth_scope, AuthScope::Streams);
        assert_eq!(config.video_layout, VideoLayout::Hierarchical);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_all_variables() {
        let config = load(&[
            ("MEDIA_DIR", "/srv/media"),
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("CORS_ALLOWED_ORIGINS", "http://a.test, http://b.test,,"),
            ("JWT_SECRET", "hunter2"),
            ("AUTH_SCOPE", "ALL"),
            ("VIDEO_LAYOUT", "flat"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
        assert_eq!(config.cors_allowed_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.jwt_secret.as_deref(), Some("hunter2"));
        assert_eq!(config.auth_scope, AuthScope::All);
        assert_eq!(config.video_layout, VideoLayout::Flat);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("MEDIA_DIR", "/m"), ("PORT", "eighty")]),
            Err(ConfigError::Invalid("PORT", _))
        ));
        assert!(matches!(
            load(&[("MEDIA_DIR", "/m"), ("VIDEO_LAYOUT", "tree")]),
            Err(ConfigError::Invalid("VIDEO_LAYOUT", _))
        ));
        assert!(matches!(
            load(&[("MEDIA_DIR", "/m"), ("AUTH_SCOPE", "none")]),
            Err(ConfigError::Invalid("AUTH_SCOPE", _))
        ));
    }
}
