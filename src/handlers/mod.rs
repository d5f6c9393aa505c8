pub mod admin;
pub mod auth;
pub mod billing;
pub mod content;
pub mod enquiry;
pub mod messages;
pub mod profile;
pub mod webhook;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// Liveness and database health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = if crate::db::check_health(&state.diesel_pool).await {
        "ok"
    } else {
        "unavailable"
    };

    Json(json!({
        "status": if database == "ok" { "ok" } else { "degraded" },
        "database": database,
    }))
}
