//! REST exposure
//!
//! Turns an [`AppState`] into the complete axum `Router`: health checks, the
//! `/api` routes, static serving of locally stored images, the envelope
//! fallbacks and the tower-http layers.

use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, middleware, routing::get};
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::{ImageStorageConfig, ServerConfig};
use crate::core::envelope::Envelope;
use crate::images::MULTIPART_OVERHEAD;
use crate::server::host::AppState;
use crate::server::router::api_routes;

pub struct RestExposure;

impl RestExposure {
    /// Build the REST router from shared state
    pub fn build_router(state: AppState) -> Router {
        let config = state.config.clone();

        let mut app = Self::health_routes().merge(api_routes(&config));

        if let ImageStorageConfig::Local { dir, .. } = &config.images.storage {
            app = app.nest_service("/uploads", ServeDir::new(dir));
        }

        // Large enough for the biggest upload; per-route limits are tighter
        let hard_limit = config
            .server
            .body_limit_bytes
            .max(config.images.max_upload_bytes + MULTIPART_OVERHEAD);

        // Outermost first; the envelope wrapper sees the bare statuses of the layers below
        let layers = ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&config.server))
            .layer(middleware::map_response(envelope_bare_errors));

        app.fallback(route_not_found)
            .method_not_allowed_fallback(method_not_allowed)
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.server.body_limit_bytes))
            .layer(RequestBodyLimitLayer::new(hard_limit))
            .layer(layers)
    }

    fn health_routes() -> Router<AppState> {
        Router::new()
            .route("/health", get(Self::health_check))
            .route("/healthz", get(Self::health_check))
    }

    async fn health_check(State(state): State<AppState>) -> Json<Value> {
        Json(json!({
            "status": "ok",
            "service": state.config.server.service_name,
        }))
    }
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    if config.cors_origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

fn failure(status: StatusCode, code: &str, message: String) -> Response {
    let envelope = Envelope::failure(message, Some(json!({ "code": code })), None);
    (status, Json(envelope)).into_response()
}

async fn route_not_found(uri: Uri) -> Response {
    failure(
        StatusCode::NOT_FOUND,
        "ROUTE_NOT_FOUND",
        format!("No route for {}", uri.path()),
    )
}

async fn method_not_allowed(method: Method, uri: Uri) -> Response {
    failure(
        StatusCode::METHOD_NOT_ALLOWED,
        "METHOD_NOT_ALLOWED",
        format!("{method} is not allowed on {}", uri.path()),
    )
}

/// Wrap error responses produced outside the handlers in an envelope
///
/// Body limits and the `/uploads` file service answer with bare statuses.
async fn envelope_bare_errors(uri: Uri, response: Response) -> Response {
    let status = response.status();
    let is_error = status.is_client_error() || status.is_server_error();
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    if !is_error || is_json {
        return response;
    }

    match status {
        StatusCode::PAYLOAD_TOO_LARGE => failure(
            status,
            "PAYLOAD_TOO_LARGE",
            "Request body is too large".to_string(),
        ),
        StatusCode::NOT_FOUND => failure(
            status,
            "NOT_FOUND",
            format!("Nothing found at {}", uri.path()),
        ),
        StatusCode::METHOD_NOT_ALLOWED => failure(
            status,
            "METHOD_NOT_ALLOWED",
            format!("Method not allowed on {}", uri.path()),
        ),
        other => failure(
            other,
            "HTTP_ERROR",
            other.canonical_reason().unwrap_or("Request failed").to_string(),
        ),
    }
}
