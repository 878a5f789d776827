//! Axum framework integration.
//!
//! This module provides the admin routes for a running [`SessionPool`](crate::SessionPool).
//!
//! # Setup
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! sheetcast = { version = "0.1", features = ["axum-integration"] }
//! axum = "0.8"
//! ```
//!
//! # Routes
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | `GET` | `/pool/stats` | | `200` [`PoolStatsResponse`] |
//! | `POST` | `/pool/refresh` | [`RefreshRequest`] | `204`, or [`ErrorResponse`] |
//!
//! # Basic Usage
//!
//! ```rust,ignore
//! use sheetcast::init_session_pool;
//! use sheetcast::integrations::axum::router;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = init_session_pool().await
//!         .expect("Failed to initialize session pool");
//!
//!     let app = router(pool.clone());
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//!
//!     pool.close_all().await;
//! }
//! ```
//!
//! # Merging into an Existing App
//!
//! The router carries its own state, so it nests into any application:
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/", get(index))
//!     .nest("/admin", sheetcast::integrations::axum::router(pool));
//! ```

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};

use crate::document::{DocumentRef, Viewport};
use crate::error::{CaptureError, Result};
use crate::pool::SharedSessionPool;
use crate::stats::PoolStats;

/// Type alias for Axum `State` extractor with the shared pool.
pub type SessionPoolState = State<SharedSessionPool>;

// ============================================================================
// Wire Types
// ============================================================================

/// Body of `GET /pool/stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatsResponse {
    pub live_sessions: usize,
    pub keys: Vec<String>,
}

impl From<PoolStats> for PoolStatsResponse {
    fn from(stats: PoolStats) -> Self {
        Self {
            live_sessions: stats.live_sessions,
            keys: stats.keys,
        }
    }
}

/// Body of `POST /pool/refresh`.
///
/// Missing dimensions fall back to the default viewport.
///
/// ```json
/// { "url": "https://sheets.example.com/d/abc/edit#gid=0", "width": 1280 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

impl RefreshRequest {
    fn viewport(&self) -> Result<Viewport> {
        let default = Viewport::default();
        Viewport::new(
            self.width.unwrap_or(default.width),
            self.height.unwrap_or(default.height),
        )
    }
}

/// JSON error body returned by every route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
    /// Stable machine-readable code, e.g. `LOAD_TIMEOUT`.
    pub code: String,
}

/// [`CaptureError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub CaptureError);

impl From<CaptureError> for ApiError {
    fn from(error: CaptureError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            error: self.0.to_string(),
            code: self.0.error_code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// `GET /pool/stats`
pub async fn pool_stats(State(pool): SessionPoolState) -> Json<PoolStatsResponse> {
    Json(pool.stats().into())
}

/// `POST /pool/refresh`
///
/// Loads the document into its pooled session (opening one if needed) and
/// forces a reload.
pub async fn refresh(
    State(pool): SessionPoolState,
    Json(request): Json<RefreshRequest>,
) -> std::result::Result<StatusCode, ApiError> {
    let document = DocumentRef::parse(&request.url)?;
    let viewport = request.viewport()?;

    log::info!("🔄 Admin refresh requested for {}", document);
    pool.refresh_session(&document, viewport).await.map_err(|e| {
        log::warn!("❌ Admin refresh of {} failed: {}", document, e);
        e
    })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Router serving the admin routes with `pool` as state.
pub fn router(pool: SharedSessionPool) -> Router {
    Router::new()
        .route("/pool/stats", get(pool_stats))
        .route("/pool/refresh", post(refresh))
        .with_state(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::engine::mock::MockEngine;
    use crate::pool::SessionPool;

    fn shared_pool() -> SharedSessionPool {
        SessionPool::builder()
            .engine(Box::new(MockEngine::new()))
            .enable_reaper(false)
            .build()
            .unwrap()
            .into_shared()
    }

    fn refresh_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/pool/refresh")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_refresh_then_stats() {
        let pool = shared_pool();
        let app = router(pool.clone());

        let response = app
            .clone()
            .oneshot(refresh_request(
                r#"{"url":"https://sheets.example.com/d/abc/edit#gid=3","width":800}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/pool/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let stats: PoolStatsResponse = json_body(response).await;
        assert_eq!(stats.live_sessions, 1);
        assert_eq!(stats.keys, vec!["https://sheets.example.com/d/abc/edit"]);

        pool.close_all().await;
    }

    #[tokio::test]
    async fn test_refresh_rejects_bad_url() {
        let app = router(shared_pool());

        let response = app
            .oneshot(refresh_request(r#"{"url":"not a url"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let error: ErrorResponse = json_body(response).await;
        assert_eq!(error.code, "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_refresh_after_close_is_unavailable() {
        let pool = shared_pool();
        pool.close_all().await;

        let response = router(pool)
            .oneshot(refresh_request(r#"{"url":"https://sheets.example.com/d/abc"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
