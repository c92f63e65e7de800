//! Router assembly. Uses parameterized paths so Path extractors receive
//! the resource segment and identifier; handlers resolve the resource by
//! name. Mount `admin_routes` under the same prefix as
//! `RouterOptions::base_path` so redirect destinations line up.

use crate::handlers::admin::{
    remove_many, show, show_record, submit, submit_record, MAX_BODY_BYTES,
};
use crate::state::AdminState;
use axum::{extract::DefaultBodyLimit, routing::get, Json, Router};
use serde::Serialize;
use tower_http::limit::RequestBodyLimitLayer;

pub fn admin_routes(state: AdminState) -> Router {
    Router::new()
        .route("/:resource", get(show).post(submit).delete(remove_many))
        .route("/:resource/:id", get(show_record).post(submit_record))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Common routes (no state): GET /health, GET /version.
pub fn common_routes() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
}
