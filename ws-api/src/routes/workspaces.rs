use crate::{auth::Caller, error::ApiResult, routes::IdQuery, state::AppState};
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use tracing::info;
use ws_orchestrator::{AppOption, StatusReport};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/launch", post(launch))
        .route("/terminate", post(terminate))
        .route("/status", get(status))
        .route("/options", get(options))
}

/// Start the app `id` for the caller.
///
/// Managed-container launches continue in the background and answer
/// `Launch accepted` immediately.
#[utoipa::path(
    post,
    path = "/launch",
    tag = "workspaces",
    params(IdQuery),
    responses(
        (status = 200, description = "Success or Launch accepted", body = String),
        (status = 400, description = "Missing app id or username"),
        (status = 403, description = "Caller may not use this app"),
        (status = 500, description = "Pay model inactive or backend failure")
    )
)]
pub async fn launch(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<IdQuery>,
) -> ApiResult<&'static str> {
    let outcome = state
        .dispatcher
        .launch(&caller.username, query.id().unwrap_or_default(), caller.token())
        .await?;
    Ok(outcome.message())
}

/// Terminate workspace `id`, or every workspace of the caller.
#[utoipa::path(
    post,
    path = "/terminate",
    tag = "workspaces",
    params(IdQuery),
    responses(
        (status = 200, description = "Terminated workspace or Terminated ECS workspace", body = String),
        (status = 400, description = "Missing username"),
        (status = 500, description = "Backend failure")
    )
)]
pub async fn terminate(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<IdQuery>,
) -> ApiResult<&'static str> {
    let terminated = state
        .dispatcher
        .terminate(&caller.username, query.id(), caller.token())
        .await?;
    info!(
        user = %caller.username,
        confirmer = terminated.confirmer.name(),
        "Termination confirmed asynchronously"
    );
    Ok(terminated.message())
}

#[utoipa::path(
    get,
    path = "/status",
    tag = "workspaces",
    params(IdQuery),
    responses(
        (status = 200, description = "One workspace status, or a list when there are several", body = StatusReport),
        (status = 400, description = "Missing username"),
        (status = 500, description = "Backend failure")
    )
)]
pub async fn status(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<IdQuery>,
) -> ApiResult<Json<StatusReport>> {
    let report = state
        .dispatcher
        .summarize(&caller.username, caller.token(), query.id())
        .await?;
    Ok(Json(report))
}

/// Apps the caller is allowed to launch.
#[utoipa::path(
    get,
    path = "/options",
    tag = "workspaces",
    responses((status = 200, description = "Launchable apps", body = [AppOption]))
)]
pub async fn options(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Json<Vec<AppOption>> {
    Json(state.dispatcher.options(&caller.username, caller.token()).await)
}
