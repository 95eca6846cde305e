//! HTTP API gateway for Hindsight.
//!
//! Exposes the retrieval endpoints (peek, turn hydration), the session
//! CRUD surface, and the streaming chat endpoint over SSE.
//!
//! Built on Axum.

pub mod api_v1;

use axum::extract::DefaultBodyLimit;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use hindsight_config::ServerConfig;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::info;

pub use api_v1::{ApiState, SharedApiState};

/// Build the full router: health probe plus the v1 API.
pub fn build_router(state: SharedApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PATCH,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB body limit
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the HTTP server and serve until shutdown.
pub async fn serve(server: &ServerConfig, state: SharedApiState) -> std::io::Result<()> {
    let addr = format!("{}:{}", server.host, server.port);
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
