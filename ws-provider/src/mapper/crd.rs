use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};
use ws_core::Result;

use super::{Route, RouteLayout, ServiceMapper};
use crate::kubernetes::model::{ObjectMeta, Service};
use crate::kubernetes::pod::{MANAGED_BY, MANAGED_BY_LABEL};
use crate::kubernetes::{Created, CustomResource, KubeClient};

/// The proxy's routing resource type.
pub const MAPPING_RESOURCE: CustomResource<'static> = CustomResource {
    group: "getambassador.io",
    version: "v2",
    plural: "mappings",
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Mapping {
    api_version: &'static str,
    kind: &'static str,
    metadata: ObjectMeta,
    spec: MappingSpec,
}

#[derive(Debug, Serialize)]
struct MappingSpec {
    prefix: String,
    service: String,
    rewrite: String,
    headers: BTreeMap<String, String>,
    use_websocket: bool,
    timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    tls: Option<bool>,
}

/// Manages a `Mapping` resource per service through the cluster API.
#[derive(Debug, Clone)]
pub struct CustomResourceMapper {
    client: KubeClient,
    layout: RouteLayout,
}

impl CustomResourceMapper {
    pub fn new(client: KubeClient, layout: RouteLayout) -> Self {
        Self { client, layout }
    }

    fn mapping(&self, route: &Route<'_>) -> Mapping {
        Mapping {
            api_version: "getambassador.io/v2",
            kind: "Mapping",
            metadata: ObjectMeta {
                name: Some(RouteLayout::mapping_name(route.service_name)),
                namespace: Some(route.namespace.to_string()),
                labels: BTreeMap::from([(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string())]),
                ..Default::default()
            },
            spec: MappingSpec {
                prefix: self.layout.prefix(route.service_name),
                service: RouteLayout::upstream(route.namespace, route.service_name),
                rewrite: route.path_rewrite.to_string(),
                headers: BTreeMap::from([("remote_user".to_string(), route.user_name.to_string())]),
                use_websocket: true,
                timeout_ms: 300_000,
                tls: route.use_tls.then_some(true),
            },
        }
    }
}

#[async_trait]
impl ServiceMapper for CustomResourceMapper {
    async fn start(&self, route: &Route<'_>, _service: &mut Service) -> Result<()> {
        let mapping = self.mapping(route);
        match self
            .client
            .create_custom_object(&MAPPING_RESOURCE, route.namespace, &mapping)
            .await?
        {
            Created::New => info!(service = route.service_name, "Created route mapping"),
            Created::AlreadyExists => {
                debug!(service = route.service_name, "Route mapping already present")
            }
        }
        Ok(())
    }

    async fn stop(&self, namespace: &str, service_name: &str) -> Result<()> {
        let name = RouteLayout::mapping_name(service_name);
        if !self
            .client
            .delete_custom_object(&MAPPING_RESOURCE, namespace, &name)
            .await?
        {
            debug!(mapping = %name, "Route mapping already gone");
        }
        Ok(())
    }

    async fn get_url(&self, _namespace: &str, service_name: &str) -> Result<String> {
        Ok(self.layout.url(service_name))
    }
}
