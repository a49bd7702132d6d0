use crate::{auth::Caller, error::ApiResult, routes::IdQuery, state::AppState};
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use ws_core::PayModel;
use ws_orchestrator::PayModelSummary;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/paymodels", get(current_paymodel))
        .route("/allpaymodels", get(all_paymodels))
        .route("/setpaymodel", post(set_paymodel))
        .route("/resetpaymodels", post(reset_paymodels))
}

#[utoipa::path(
    get,
    path = "/paymodels",
    tag = "paymodels",
    responses(
        (status = 200, description = "Current pay model", body = PayModel),
        (status = 404, description = "No current pay model")
    )
)]
pub async fn current_paymodel(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<PayModel>> {
    Ok(Json(state.dispatcher.paymodel(&caller.username).await?))
}

#[utoipa::path(
    get,
    path = "/allpaymodels",
    tag = "paymodels",
    responses(
        (status = 200, description = "Current and selectable pay models", body = PayModelSummary),
        (status = 404, description = "No pay model configured")
    )
)]
pub async fn all_paymodels(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<PayModelSummary>> {
    Ok(Json(state.dispatcher.all_paymodels(&caller.username).await?))
}

/// Make pay model `id` current. Refused while a workspace is live.
#[utoipa::path(
    post,
    path = "/setpaymodel",
    tag = "paymodels",
    params(IdQuery),
    responses(
        (status = 200, description = "New current pay model", body = PayModel),
        (status = 400, description = "Missing id or username"),
        (status = 500, description = "Workspace running or unknown pay model")
    )
)]
pub async fn set_paymodel(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<IdQuery>,
) -> ApiResult<Json<PayModel>> {
    let paymodel = state
        .dispatcher
        .set_paymodel(&caller.username, query.id().unwrap_or_default(), caller.token())
        .await?;
    Ok(Json(paymodel))
}

#[utoipa::path(
    post,
    path = "/resetpaymodels",
    tag = "paymodels",
    responses(
        (status = 200, description = "Current Paymodel has been reset", body = String),
        (status = 400, description = "Missing username"),
        (status = 500, description = "Workspace running or store failure")
    )
)]
pub async fn reset_paymodels(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<&'static str> {
    state
        .dispatcher
        .reset_paymodels(&caller.username, caller.token())
        .await?;
    Ok("Current Paymodel has been reset")
}
