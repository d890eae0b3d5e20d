//! HTTP server: routes, handlers and lifecycle

use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::auth::require_bearer;
use crate::config::{AuthScope, ServerConfig, VideoLayout};
use crate::error::MediaError;
use crate::hls::resolve_hls;
use crate::listing::{list_dir, ListFilter};
use crate::media::MediaKind;
use crate::state::{ServerState, GAMES_DIR, PDFS_DIR, VIDEOS_DIR};
use crate::stream::stream_file;

/// Media server API for building and running the HTTP server
#[derive(Clone)]
pub struct MediaServerApi {
    state: ServerState,
    cors_allowed_origins: Vec<String>,
}

impl MediaServerApi {
    /// Create a new media server API
    ///
    /// # Arguments
    /// * `state` - Shared server state
    /// * `cors_allowed_origins` - Origins allowed cross-origin access, empty for none
    pub fn new(state: ServerState, cors_allowed_origins: Vec<String>) -> Self {
        Self {
            state,
            cors_allowed_origins,
        }
    }

    /// Build the server from configuration, logging the effective setup
    pub fn from_config(config: &ServerConfig) -> crate::Result<Self> {
        let state = ServerState::from_config(config)
            .map_err(|e| format!("media directory {}: {}", config.media_dir.display(), e))?;

        tracing::info!("Serving media from directory: {}", state.media_dir().display());
        tracing::info!("Video layout: {:?}", state.video_layout());
        if config.cors_allowed_origins.is_empty() {
            tracing::warn!("CORS is not configured for any specific origins");
        } else {
            tracing::info!("CORS is enabled for origins: {}", config.cors_allowed_origins.join(", "));
        }
        if state.gate().is_some() {
            tracing::info!("Bearer token verification enabled for {:?} routes", state.auth_scope());
        } else {
            tracing::warn!("JWT_SECRET is not set, all routes are public");
        }

        Ok(Self::new(state, config.cors_allowed_origins.clone()))
    }

    /// Get the server state
    pub fn state(&self) -> &ServerState {
        &self.state
    }

    /// Create the axum router with all routes configured
    pub fn router(&self) -> Router {
        let mut listings = Router::new()
            .route("/videos", get(list_videos))
            .route("/pdfs", get(list_pdfs))
            .route("/games", get(list_games));

        let mut streams = Router::new()
            .route("/pdfs/:filename", get(serve_pdf))
            .route("/games/*path", get(serve_game));

        match self.state.video_layout() {
            VideoLayout::Hierarchical => {
                listings = listings
                    .route("/videos/:activity", get(list_categories))
                    .route("/videos/:activity/:category", get(list_category_videos));
                streams = streams.route("/videos/:activity/:category/*path", get(stream_category_video));
            }
            VideoLayout::Flat => {
                streams = streams.route("/videos/*path", get(stream_flat_video));
            }
        }

        if let Some(gate) = self.state.gate() {
            let gate_layer = middleware::from_fn_with_state(gate, require_bearer);
            if self.state.auth_scope() == AuthScope::All {
                listings = listings.route_layer(gate_layer.clone());
            }
            streams = streams.route_layer(gate_layer);
        }

        let router = Router::new()
            .route("/", get(root_status))
            .route("/health", get(health_check))
            .merge(listings)
            .merge(streams)
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        match cors_layer(&self.cors_allowed_origins) {
            Some(cors) => router.layer(cors),
            None => router,
        }
    }

    /// Start the media server and run until Ctrl-C or SIGTERM
    ///
    /// # Arguments
    /// * `addr` - Address to bind to (e.g., "0.0.0.0:8080")
    pub async fn serve(self, addr: &str) -> crate::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;

        tracing::info!("Media server listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Media server stopped");
        Ok(())
    }
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::RANGE])
            .expose_headers([header::CONTENT_RANGE, header::ACCEPT_RANGES, header::CONTENT_LENGTH]),
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Service banner
async fn root_status() -> Json<Value> {
    Json(json!({ "message": "Media Streaming Server is running." }))
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "Media server running")
}

async fn list_entries(
    state: &ServerState,
    segments: &[&str],
    filter: ListFilter,
) -> Result<Json<Vec<String>>, MediaError> {
    let dir = state.root().resolve(segments).await?;
    Ok(Json(list_dir(&dir, filter).await?))
}

/// Activities in the hierarchical layout, video files in the flat one
async fn list_videos(State(state): State<ServerState>) -> Result<Json<Vec<String>>, MediaError> {
    let filter = match state.video_layout() {
        VideoLayout::Hierarchical => ListFilter::directories(),
        VideoLayout::Flat => ListFilter::extension("mp4"),
    };
    list_entries(&state, &[VIDEOS_DIR], filter).await
}

async fn list_categories(
    State(state): State<ServerState>,
    Path(activity): Path<String>,
) -> Result<Json<Vec<String>>, MediaError> {
    list_entries(&state, &[VIDEOS_DIR, &activity], ListFilter::directories()).await
}

async fn list_category_videos(
    State(state): State<ServerState>,
    Path((activity, category)): Path<(String, String)>,
) -> Result<Json<Vec<String>>, MediaError> {
    list_entries(&state, &[VIDEOS_DIR, &activity, &category], ListFilter::extension("mp4")).await
}

async fn list_pdfs(State(state): State<ServerState>) -> Result<Json<Vec<String>>, MediaError> {
    list_entries(&state, &[PDFS_DIR], ListFilter::extension("pdf")).await
}

async fn list_games(State(state): State<ServerState>) -> Result<Json<Vec<String>>, MediaError> {
    list_entries(&state, &[GAMES_DIR], ListFilter::directories()).await
}

/// Stream a video, playlist or segment below `activity/category`
async fn stream_category_video(
    State(state): State<ServerState>,
    Path((activity, category, path)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, MediaError> {
    tracing::info!("Request received for video: {}/{}/{}", activity, category, path);
    stream_video(&state, &[VIDEOS_DIR, &activity, &category], &path, &headers).await
}

/// Stream a video, playlist or segment directly below `videos`
async fn stream_flat_video(
    State(state): State<ServerState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, MediaError> {
    tracing::info!("Request received for video: {}", path);
    stream_video(&state, &[VIDEOS_DIR], &path, &headers).await
}

async fn stream_video(
    state: &ServerState,
    base: &[&str],
    path: &str,
    headers: &HeaderMap,
) -> Result<Response, MediaError> {
    let asset = resolve_hls(state.root(), base, path.trim_start_matches('/')).await?;
    stream_file(&asset.path, headers.get(header::RANGE), asset.mime_type()).await
}

/// Stream a PDF for inline display
async fn serve_pdf(
    State(state): State<ServerState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Result<Response, MediaError> {
    tracing::info!("Request received for PDF: {}", filename);
    let path = state.root().resolve(&[PDFS_DIR, &filename]).await?;
    let mut response =
        stream_file(&path, headers.get(header::RANGE), MediaKind::Pdf.mime_type()).await?;

    let name = header_safe(path.file_name().unwrap_or(filename.as_str()));
    let disposition = format!("inline; filename=\"{}\"", name);
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

/// Replace characters that cannot appear in a quoted header parameter
fn header_safe(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}

/// Hand the request to a static file service rooted at the game bundle
///
/// `/games/{name}` redirects to `/games/{name}/` so relative asset links in
/// the bundle's `index.html` resolve inside the bundle.
async fn serve_game(
    State(state): State<ServerState>,
    Path(path): Path<String>,
    mut request: Request,
) -> Result<Response, MediaError> {
    let Some((name, asset)) = path.trim_start_matches('/').split_once('/') else {
        let location = format!("{}/", request.uri().path());
        return Ok(Redirect::permanent(&location).into_response());
    };
    tracing::debug!("Request received for game {}: /{}", name, asset);

    state.root().join(&[GAMES_DIR, name, asset])?;
    let bundle = state.root().resolve(&[GAMES_DIR, name]).await?;

    // Forward the same decoded asset path the guard checked
    let encoded: Vec<_> = asset.split('/').map(urlencoding::encode).collect();
    let path_and_query = match request.uri().query() {
        Some(query) => format!("/{}?{}", encoded.join("/"), query),
        None => format!("/{}", encoded.join("/")),
    };
    *request.uri_mut() = path_and_query
        .parse::<Uri>()
        .map_err(|_| MediaError::NotFound)?;

    let response = ServeDir::new(bundle.as_path())
        .oneshot(request)
        .await
        .map_err(|e| MediaError::Io(std::io::Error::other(e)))?;
    Ok(response.into_response())
}
