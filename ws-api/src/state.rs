use sqlx::SqlitePool;
use ws_orchestrator::{Components, Dispatcher};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    /// Pay model database, when one is configured; probed by readiness checks.
    pub pool: Option<SqlitePool>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, pool: Option<SqlitePool>) -> Self {
        Self { dispatcher, pool }
    }
}

impl From<Components> for AppState {
    fn from(components: Components) -> Self {
        Self::new(components.dispatcher, components.pool)
    }
}
