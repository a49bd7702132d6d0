//! Persistent pay model records.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, instrument};
use ws_core::{PayModel, LISTABLE_STATUSES};

use crate::error::Result;

/// Access to stored pay model records.
#[async_trait]
pub trait PayModelStore: Send + Sync {
    /// Records whose `request_status` is listable, oldest first.
    async fn list_for_user(&self, user: &str) -> Result<Vec<PayModel>>;

    /// Records flagged current, whatever their status.
    async fn list_current(&self, user: &str) -> Result<Vec<PayModel>>;

    /// Make `id` the user's only current record in one write.
    ///
    /// Returns `None`, and changes nothing, when the user has no listable
    /// record `id`.
    async fn set_current(&self, user: &str, id: &str) -> Result<Option<PayModel>>;

    /// Clear the current flag on all of the user's records.
    async fn clear_current(&self, user: &str) -> Result<u64>;

    /// Insert or replace a record. Used by provisioning tools and tests.
    async fn upsert(&self, paymodel: &PayModel) -> Result<()>;
}

#[derive(Clone)]
pub struct SqlitePayModelStore {
    pool: SqlitePool,
}

impl SqlitePayModelStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl PayModelStore for SqlitePayModelStore {
    async fn list_for_user(&self, user: &str) -> Result<Vec<PayModel>> {
        let rows = sqlx::query_as::<_, PayModelRow>(
            "SELECT * FROM paymodels WHERE user_id = ? AND request_status IN (?, ?) ORDER BY rowid",
        )
        .bind(user)
        .bind(LISTABLE_STATUSES[0])
        .bind(LISTABLE_STATUSES[1])
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PayModel::from).collect())
    }

    async fn list_current(&self, user: &str) -> Result<Vec<PayModel>> {
        let rows = sqlx::query_as::<_, PayModelRow>(
            "SELECT * FROM paymodels WHERE user_id = ? AND current_pay_model = 1 ORDER BY rowid",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PayModel::from).collect())
    }

    #[instrument(skip(self))]
    async fn set_current(&self, user: &str, id: &str) -> Result<Option<PayModel>> {
        let mut tx = self.pool.begin().await?;

        // Clearing and setting happen in one statement; it only touches rows
        // when the target exists and is selectable.
        let result = sqlx::query(
            r#"
            UPDATE paymodels
            SET current_pay_model = (bmh_workspace_id = ?)
            WHERE user_id = ?
              AND EXISTS (
                  SELECT 1 FROM paymodels
                  WHERE user_id = ? AND bmh_workspace_id = ? AND request_status IN (?, ?)
              )
            "#,
        )
        .bind(id)
        .bind(user)
        .bind(user)
        .bind(id)
        .bind(LISTABLE_STATUSES[0])
        .bind(LISTABLE_STATUSES[1])
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            debug!("No such pay model");
            return Ok(None);
        }

        let row = sqlx::query_as::<_, PayModelRow>(
            "SELECT * FROM paymodels WHERE user_id = ? AND bmh_workspace_id = ?",
        )
        .bind(user)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.map(PayModel::from))
    }

    async fn clear_current(&self, user: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE paymodels SET current_pay_model = 0 WHERE user_id = ? AND current_pay_model = 1",
        )
        .bind(user)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn upsert(&self, pm: &PayModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO paymodels (user_id, bmh_workspace_id, workspace_type, account_id, region, local, ecs,
                                   request_status, subnet, hard_limit, soft_limit, total_usage, current_pay_model)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id, bmh_workspace_id) DO UPDATE SET
                workspace_type = excluded.workspace_type,
                account_id = excluded.account_id,
                region = excluded.region,
                local = excluded.local,
                ecs = excluded.ecs,
                request_status = excluded.request_status,
                subnet = excluded.subnet,
                hard_limit = excluded.hard_limit,
                soft_limit = excluded.soft_limit,
                total_usage = excluded.total_usage,
                current_pay_model = excluded.current_pay_model
            "#,
        )
        .bind(&pm.user)
        .bind(&pm.id)
        .bind(&pm.name)
        .bind(&pm.aws_account_id)
        .bind(&pm.region)
        .bind(pm.local)
        .bind(pm.ecs)
        .bind(&pm.status)
        .bind(pm.subnet)
        .bind(pm.hard_limit)
        .bind(pm.soft_limit)
        .bind(pm.total_usage)
        .bind(pm.current)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct PayModelRow {
    user_id: String,
    bmh_workspace_id: String,
    workspace_type: String,
    account_id: String,
    region: String,
    local: bool,
    ecs: bool,
    request_status: String,
    subnet: i64,
    hard_limit: f64,
    soft_limit: f64,
    total_usage: f64,
    current_pay_model: bool,
}

impl From<PayModelRow> for PayModel {
    fn from(row: PayModelRow) -> Self {
        Self {
            id: row.bmh_workspace_id,
            user: row.user_id,
            name: row.workspace_type,
            aws_account_id: row.account_id,
            region: row.region,
            local: row.local,
            ecs: row.ecs,
            status: row.request_status,
            subnet: row.subnet,
            hard_limit: row.hard_limit,
            soft_limit: row.soft_limit,
            total_usage: row.total_usage,
            current: row.current_pay_model,
        }
    }
}
