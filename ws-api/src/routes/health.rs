use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "ws-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Ready when the pay model database answers, or when none is configured.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses((status = 200, description = "Readiness report"))
)]
pub async fn readiness_check(State(state): State<AppState>) -> Json<Value> {
    let database = match &state.pool {
        Some(pool) => {
            if sqlx::query("SELECT 1").fetch_one(pool).await.is_ok() {
                "connected"
            } else {
                "disconnected"
            }
        }
        None => "not_configured",
    };
    let ready = database != "disconnected";

    Json(json!({
        "status": if ready { "ready" } else { "not_ready" },
        "service": "ws-api",
        "version": env!("CARGO_PKG_VERSION"),
        "database": database
    }))
}
