//! HTTP boundary of the collector.
//!
//! This module provides an HTTP server that:
//! - Accepts heart-rate samples from the sensor relay via GET /heartrater/push
//! - Serves the current chart via GET /heartrater/plot.png
//! - Serves the bot avatar via GET /heartrater/logo.jpeg
//!
//! # Architecture
//!
//! ```text
//! Sensor relay ──→ /heartrater/push ──→ SampleStore ──→ PanicDetector
//!                                            │
//! Chat bots ←── /heartrater/plot.png ←── ChartRenderer
//! ```
//!
//! Token and parameter validation happen here; nothing malformed reaches
//! the store.

use crate::chart::{ChartRenderer, RenderError};
use crate::core::{is_rate_literal, PanicState, SharedSampleStore};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub const PUSH_PATH: &str = "/heartrater/push";
pub const PLOT_PATH: &str = "/heartrater/plot.png";
pub const LOGO_PATH: &str = "/heartrater/logo.jpeg";
pub const HEALTH_PATH: &str = "/health";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: IpAddr,
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Shared-secret token expected on push and plot requests
    pub token: String,
    /// Logo image served at [`LOGO_PATH`]
    pub logo_path: Option<PathBuf>,
    /// Label timezone for rendered charts
    pub renderer: ChartRenderer,
}

impl ServerConfig {
    /// Create a new server configuration bound to localhost
    pub fn new(port: u16, token: impl Into<String>) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
            token: token.into(),
            logo_path: None,
            renderer: ChartRenderer::default(),
        }
    }

    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn with_logo(mut self, path: PathBuf) -> Self {
        self.logo_path = Some(path);
        self
    }

    pub fn with_renderer(mut self, renderer: ChartRenderer) -> Self {
        self.renderer = renderer;
        self
    }
}

/// Shared server state
pub struct ServerState {
    /// Rolling window shared with whoever started the server
    store: SharedSampleStore,
    token: String,
    renderer: ChartRenderer,
    logo_path: Option<PathBuf>,
}

impl ServerState {
    /// Create new server state around an existing store
    pub fn new(config: &ServerConfig, store: SharedSampleStore) -> Self {
        Self {
            store,
            token: config.token.clone(),
            renderer: config.renderer.clone(),
            logo_path: config.logo_path.clone(),
        }
    }

    fn authorize(&self, token: Option<&str>) -> Result<(), ApiError> {
        match token {
            Some(token) if tokens_match(token, &self.token) => Ok(()),
            _ => Err(ApiError::Unauthorized),
        }
    }
}

/// Boundary errors. None of them carry a response body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing or mismatched token")]
    Unauthorized,
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("chart rendering failed: {0}")]
    Render(#[from] RenderError),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("not found")]
    NotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Render(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        };

        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("Rejected request: {}", self);
        }

        status.into_response()
    }
}

/// Query string of the push endpoint
#[derive(Debug, Deserialize)]
pub struct PushParams {
    pub token: Option<String>,
    pub timestamp: Option<String>,
    pub rate: Option<String>,
}

/// Query string of the plot endpoint
#[derive(Debug, Deserialize)]
pub struct TokenParams {
    pub token: Option<String>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub samples: usize,
    pub panic: PanicState,
}

/// Timestamp must be a finite real number.
fn parse_timestamp(raw: Option<&str>) -> Result<f64, ApiError> {
    let raw = raw.ok_or_else(|| ApiError::Validation("missing timestamp".to_string()))?;
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|t| t.is_finite())
        .ok_or_else(|| ApiError::Validation(format!("malformed timestamp {raw:?}")))
}

/// Rate must be a plain run of ASCII digits (no sign) that fits in u32.
fn parse_rate(raw: Option<&str>) -> Result<u32, ApiError> {
    let raw = raw.ok_or_else(|| ApiError::Validation("missing rate".to_string()))?;
    if !is_rate_literal(raw) {
        return Err(ApiError::Validation(format!("malformed rate {raw:?}")));
    }
    raw.parse()
        .map_err(|_| ApiError::Validation(format!("rate {raw:?} out of range")))
}

/// Byte comparison whose duration does not depend on where the inputs differ.
fn tokens_match(given: &str, expected: &str) -> bool {
    let (given, expected) = (given.as_bytes(), expected.as_bytes());
    if given.len() != expected.len() {
        return false;
    }
    given
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// GET /health
async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        samples: state.store.len(),
        panic: state.store.panic_state(),
    })
}

/// GET /heartrater/push
///
/// Records one sample. Empty 200 on success.
async fn push(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<PushParams>,
) -> Result<StatusCode, ApiError> {
    state.authorize(params.token.as_deref())?;
    let timestamp = parse_timestamp(params.timestamp.as_deref())?;
    let rate = parse_rate(params.rate.as_deref())?;

    state.store.push(timestamp, rate);
    Ok(StatusCode::OK)
}

/// GET /heartrater/plot.png
///
/// The body is empty when the window holds no readings yet.
async fn plot(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<TokenParams>,
) -> Result<Response, ApiError> {
    state.authorize(params.token.as_deref())?;

    let snapshot = state.store.snapshot();
    let renderer = state.renderer.clone();
    let image = tokio::task::spawn_blocking(move || renderer.build(&snapshot))
        .await
        .map_err(|e| ApiError::Internal(format!("render task failed: {e}")))??;

    Ok(([(header::CONTENT_TYPE, "image/png")], image).into_response())
}

/// GET /heartrater/logo.jpeg
async fn logo(State(state): State<Arc<ServerState>>) -> Result<Response, ApiError> {
    let path = state.logo_path.as_ref().ok_or(ApiError::NotFound)?;
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ApiError::NotFound
        } else {
            ApiError::Internal(format!("failed to read {path:?}: {e}"))
        }
    })?;

    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response())
}

/// Build the router around shared state
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(PUSH_PATH, get(push))
        .route(PLOT_PATH, get(plot))
        .route(LOGO_PATH, get(logo))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    store: SharedSampleStore,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::new(&config, store));
    let app = router(state);

    let addr = SocketAddr::new(config.host, config.port);
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Heartrater collector listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp(Some("1700000000.25")).unwrap(), 1_700_000_000.25);
        assert_eq!(parse_timestamp(Some("100")).unwrap(), 100.0);
        assert!(parse_timestamp(None).is_err());
        assert!(parse_timestamp(Some("")).is_err());
        assert!(parse_timestamp(Some("soon")).is_err());
        assert!(parse_timestamp(Some("inf")).is_err());
        assert!(parse_timestamp(Some("NaN")).is_err());
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate(Some("72")).unwrap(), 72);
        assert_eq!(parse_rate(Some("0")).unwrap(), 0);
        assert!(parse_rate(None).is_err());
        assert!(parse_rate(Some("")).is_err());
        assert!(parse_rate(Some("-5")).is_err());
        assert!(parse_rate(Some("+5")).is_err());
        assert!(parse_rate(Some("7.5")).is_err());
        assert!(parse_rate(Some("99999999999")).is_err());
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("secret", "secret"));
        assert!(!tokens_match("secreT", "secret"));
        assert!(!tokens_match("secret1", "secret"));
        assert!(!tokens_match("", "secret"));
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(ApiError::Unauthorized.into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::Validation("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Internal("x".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
