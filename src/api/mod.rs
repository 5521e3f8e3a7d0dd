//! HTTP API for the lifechanger app shell.
//!
//! Mounts all endpoint groups under /v1:
//! - /v1/oauth        — Garmin authorize redirect + callback
//! - /v1/session      — connection status, logout
//! - /v1/body-battery — daily aggregates
//! - /v1/changes      — life-change log
//! - /v1/insights     — pre/post change comparison
//! - /v1/status       — Health check

pub mod routes;

use crate::SharedState;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/v1", routes::v1_router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
