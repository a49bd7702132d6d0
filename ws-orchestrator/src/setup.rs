//! Wiring a [`Dispatcher`] from configuration.

use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;
use ws_config::Config;
use ws_provider::aws::AwsSessions;
use ws_provider::ecs::{EcsContainerService, ManagedContainerBackend};
use ws_provider::external::external_backend;
use ws_provider::kubernetes::KubeClient;
use ws_provider::local::local_backend;
use ws_provider::mapper::{build_mapper, RouteLayout};

use crate::authz::{Authorizer, PolicyServiceAuthorizer, StaticAuthorizer};
use crate::db::{create_pool, run_migrations};
use crate::dispatcher::{Backends, Dispatcher};
use crate::error::Result;
use crate::resolver::PayModelResolver;
use crate::store::{PayModelStore, SqlitePayModelStore};

/// Everything the HTTP layer needs at runtime.
#[derive(Clone)]
pub struct Components {
    pub dispatcher: Dispatcher,
    /// Present when a pay model database is configured.
    pub pool: Option<SqlitePool>,
}

pub async fn build_components(config: &Config) -> Result<Components> {
    let registry = config.registry()?;
    let layout = RouteLayout::from_config(config);

    let client = KubeClient::from_settings(&config.kubernetes).await?;
    info!(api = client.base_url(), "Cluster client ready");
    let mapper = build_mapper(config.service_mapper, layout.clone(), Some(client.clone()))?;

    let sessions = AwsSessions::from_env().await;
    let ecs = EcsContainerService::new(sessions.clone(), config.managed_container.clone());

    let backends = Backends {
        local: Arc::new(local_backend(client, config.user_namespace.clone(), mapper.clone())),
        external: Arc::new(external_backend(
            sessions,
            config.external.clone(),
            config.external_namespace(),
            mapper,
        )),
        managed: Arc::new(ManagedContainerBackend::new(
            Arc::new(ecs),
            registry.clone(),
            layout,
        )),
    };

    let pool = match &config.paymodel_db {
        Some(path) => {
            let pool = create_pool(path).await?;
            run_migrations(&pool).await?;
            info!(db = %path.display(), "Pay model store ready");
            Some(pool)
        }
        None => {
            info!("No pay model store configured, using the default pay model");
            None
        }
    };
    let store = pool
        .clone()
        .map(|p| Arc::new(SqlitePayModelStore::new(p)) as Arc<dyn PayModelStore>);
    let resolver = PayModelResolver::new(store, config.default_paymodel.clone());

    let authorizer: Arc<dyn Authorizer> = match &config.authz {
        Some(settings) => Arc::new(PolicyServiceAuthorizer::new(settings)?),
        None => Arc::new(StaticAuthorizer),
    };

    info!(apps = registry.len(), "Dispatcher configured");
    Ok(Components {
        dispatcher: Dispatcher::new(
            backends,
            resolver,
            registry,
            authorizer,
            config.confirm.poll_interval(),
        ),
        pool,
    })
}
