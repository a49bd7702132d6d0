use utoipa::OpenApi;
use ws_core::{BackendKind, PayModel};
use ws_orchestrator::{AppOption, PayModelSummary, StatusReport};
use ws_provider::{CanonicalStatus, ConditionView, ContainerState, ContainerStateView, WorkspaceStatus};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health_check,
        crate::routes::health::readiness_check,
        crate::routes::workspaces::launch,
        crate::routes::workspaces::terminate,
        crate::routes::workspaces::status,
        crate::routes::workspaces::options,
        crate::routes::paymodels::current_paymodel,
        crate::routes::paymodels::all_paymodels,
        crate::routes::paymodels::set_paymodel,
        crate::routes::paymodels::reset_paymodels,
    ),
    components(
        schemas(
            PayModel,
            PayModelSummary,
            BackendKind,
            AppOption,
            StatusReport,
            WorkspaceStatus,
            CanonicalStatus,
            ConditionView,
            ContainerStateView,
            ContainerState
        )
    ),
    tags(
        (name = "workspaces", description = "Workspace lifecycle"),
        (name = "paymodels", description = "Pay model selection"),
        (name = "health", description = "Liveness and readiness")
    )
)]
pub struct ApiDoc;
