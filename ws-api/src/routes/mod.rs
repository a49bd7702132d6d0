pub mod health;
pub mod paymodels;
pub mod workspaces;

use crate::{api_docs::ApiDoc, auth::identity_middleware, state::AppState};
use axum::{middleware, routing::get, Json, Router};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{IntoParams, OpenApi};

/// Optional `?id=` shared by most routes.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IdQuery {
    /// App id for `/launch`, workspace id for `/terminate` and `/status`,
    /// pay model id for `/setpaymodel`.
    pub id: Option<String>,
}

impl IdQuery {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .merge(health::routes()) // Health routes don't need identity
        .route("/api-docs/openapi.json", get(openapi_spec))
        .merge(
            workspaces::routes()
                .merge(paymodels::routes())
                .layer(middleware::from_fn(identity_middleware)),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
