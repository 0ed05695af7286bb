//! Alexios mailbox skill server library logic.

pub mod api;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod retention;

use axum::{
    extract::DefaultBodyLimit,
    routing::{any, get},
    Extension, Json, Router,
};
use dispatch::Dispatcher;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Routes utterances to the configured store.
    pub dispatcher: Dispatcher,
}

/// Maximum request body size after decompression (64 KiB). Utterances are
/// short; anything larger is not a platform request.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", any(api::webhook_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(RequestDecompressionLayer::new().pass_through_unaccepted(true))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
