//! Axum server setup and router configuration.

use crate::api;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use nftvault_sdk::objects::{ErrorResponse, ProviderKind};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Largest accepted request body. Provider webhooks are a few KiB.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(api::router())
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    default_provider: ProviderKind,
    providers: Vec<ProviderKind>,
}

/// Liveness plus the checkout providers this instance can use.
async fn health_check(state: State<AppState>) -> impl IntoResponse {
    let providers = state.lifecycle.providers();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        default_provider: providers.default_kind(),
        providers: ProviderKind::ALL
            .into_iter()
            .filter(|kind| providers.is_configured(*kind))
            .collect(),
    })
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "not_found".into(),
            message: "no such route".into(),
            order_id: None,
            claim_token: None,
        }),
    )
}

/// Run the server with graceful shutdown support.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}
