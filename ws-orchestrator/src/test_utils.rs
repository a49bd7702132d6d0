//! A dispatcher wired to scripted backends and an in-memory store.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use ws_config::{ContainerDefinition, ContainerRegistry};
use ws_core::{BackendKind, PayModel};
use ws_provider::mock::MockBackend;

use crate::authz::{Authorizer, StaticAuthorizer};
use crate::db::create_memory_pool;
use crate::dispatcher::{Backends, Dispatcher};
use crate::error::Result;
use crate::resolver::PayModelResolver;
use crate::store::{PayModelStore, SqlitePayModelStore};

pub const TEST_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct TestHarness {
    pub dispatcher: Dispatcher,
    pub local: Arc<MockBackend>,
    pub external: Arc<MockBackend>,
    pub managed: Arc<MockBackend>,
    pub store: Arc<SqlitePayModelStore>,
}

impl TestHarness {
    pub async fn new(definitions: &[ContainerDefinition]) -> Self {
        Self::with_authorizer(definitions, Arc::new(StaticAuthorizer)).await
    }

    pub async fn with_authorizer(
        definitions: &[ContainerDefinition],
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        let pool = create_memory_pool()
            .await
            .expect("Failed to create in-memory database");
        let store = Arc::new(SqlitePayModelStore::new(pool));
        let local = Arc::new(MockBackend::new(BackendKind::Local));
        let external = Arc::new(MockBackend::new(BackendKind::External));
        let managed = Arc::new(MockBackend::new(BackendKind::ManagedContainer));

        let registry =
            ContainerRegistry::from_definitions(definitions).expect("Invalid test definitions");
        let resolver = PayModelResolver::new(Some(store.clone() as Arc<dyn PayModelStore>), None);
        let dispatcher = Dispatcher::new(
            Backends {
                local: local.clone(),
                external: external.clone(),
                managed: managed.clone(),
            },
            resolver,
            registry,
            authorizer,
            TEST_POLL_INTERVAL,
        );

        Self {
            dispatcher,
            local,
            external,
            managed,
            store,
        }
    }

    pub async fn seed(&self, paymodel: PayModel) {
        self.store
            .upsert(&paymodel)
            .await
            .expect("Failed to seed pay model");
    }

    pub async fn current(&self, user: &str) -> Vec<PayModel> {
        self.store
            .list_current(user)
            .await
            .expect("Failed to read current pay models")
    }
}

/// App definition with sane limits; `image` makes the id unique.
pub fn definition(name: &str, image: &str) -> ContainerDefinition {
    serde_json::from_value(serde_json::json!({
        "name": name,
        "image": image,
        "cpu_limit": "1",
        "memory_limit": "2Gi"
    }))
    .expect("Invalid test definition")
}

/// Current pay model record for `user` in `status`.
pub fn paymodel(user: &str, id: &str, kind: BackendKind, status: &str) -> PayModel {
    PayModel {
        id: id.to_string(),
        user: user.to_string(),
        name: "Direct Pay".to_string(),
        aws_account_id: "123456789012".to_string(),
        region: "us-east-1".to_string(),
        local: kind == BackendKind::Local,
        ecs: kind == BackendKind::ManagedContainer,
        status: status.to_string(),
        current: true,
        ..Default::default()
    }
}

/// Grants exactly the apps whose names it was given.
pub struct AllowNames(pub Vec<String>);

#[async_trait]
impl Authorizer for AllowNames {
    async fn is_authorized(
        &self,
        _user: &str,
        _token: Option<&str>,
        definition: &ContainerDefinition,
    ) -> Result<bool> {
        Ok(self.0.iter().any(|n| n == &definition.name))
    }
}
