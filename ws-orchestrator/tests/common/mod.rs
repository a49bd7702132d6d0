//! Shared fixtures for ws-orchestrator integration tests

#![allow(dead_code)]

use std::sync::Arc;
use tempfile::TempDir;
use ws_core::PayModel;
use ws_orchestrator::db::{create_pool, run_migrations};
use ws_orchestrator::{PayModelResolver, PayModelStore, SqlitePayModelStore};

/// File-backed store in a temporary directory. Keep the `TempDir` alive.
pub async fn file_store() -> (TempDir, Arc<SqlitePayModelStore>) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = open_store(&dir).await;
    (dir, store)
}

pub async fn open_store(dir: &TempDir) -> Arc<SqlitePayModelStore> {
    let pool = create_pool(&dir.path().join("db").join("paymodels.db"))
        .await
        .expect("Failed to open database");
    run_migrations(&pool).await.expect("Failed to run migrations");
    Arc::new(SqlitePayModelStore::new(pool))
}

pub fn resolver(store: &Arc<SqlitePayModelStore>) -> PayModelResolver {
    PayModelResolver::new(Some(store.clone() as Arc<dyn PayModelStore>), None)
}

pub fn record(user: &str, id: &str, current: bool) -> PayModel {
    PayModel {
        id: id.to_string(),
        user: user.to_string(),
        name: "Direct Pay".to_string(),
        aws_account_id: "123456789012".to_string(),
        region: "us-east-1".to_string(),
        status: "active".to_string(),
        current,
        ..Default::default()
    }
}
