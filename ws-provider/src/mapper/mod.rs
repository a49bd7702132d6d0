//! Registration of workspace services with the public proxy.
//!
//! Two mappers share one interface: [`AnnotationMapper`] writes the route
//! onto the service object before it is submitted, [`CustomResourceMapper`]
//! manages a separate routing resource. Both are idempotent.

use async_trait::async_trait;
use std::sync::Arc;
use ws_config::{Config, ServiceMapperKind};
use ws_core::{Result, WsError};

use crate::kubernetes::model::Service;
use crate::kubernetes::KubeClient;

mod annotation;
mod crd;

pub use annotation::{AnnotationMapper, ROUTE_ANNOTATION};
pub use crd::{CustomResourceMapper, MAPPING_RESOURCE};

/// Everything a mapper needs to route one service.
#[derive(Debug, Clone)]
pub struct Route<'a> {
    pub namespace: &'a str,
    pub service_name: &'a str,
    pub user_name: &'a str,
    pub path_rewrite: &'a str,
    pub use_tls: bool,
}

#[async_trait]
pub trait ServiceMapper: Send + Sync {
    /// Register `route`. May mutate `service` before it is created.
    async fn start(&self, route: &Route<'_>, service: &mut Service) -> Result<()>;

    /// Remove the route. Stopping an unknown route succeeds.
    async fn stop(&self, namespace: &str, service_name: &str) -> Result<()>;

    async fn get_url(&self, namespace: &str, service_name: &str) -> Result<String>;
}

/// Public URL layout shared by both mappers.
#[derive(Debug, Clone)]
pub struct RouteLayout {
    public_url: String,
    proxy_prefix: String,
}

impl RouteLayout {
    pub fn new(public_url: &str, proxy_prefix: &str) -> Self {
        Self {
            public_url: public_url.trim_end_matches('/').to_string(),
            proxy_prefix: proxy_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.server.public_url, &config.proxy_prefix)
    }

    /// Path prefix the proxy matches for `service_name`, with a trailing slash.
    pub fn prefix(&self, service_name: &str) -> String {
        format!("{}/{}/", self.proxy_prefix, service_name)
    }

    pub fn url(&self, service_name: &str) -> String {
        format!("{}{}", self.public_url, self.prefix(service_name))
    }

    /// Name of the routing object for `service_name`.
    pub fn mapping_name(service_name: &str) -> String {
        format!("{service_name}-mapping")
    }

    /// Cluster-internal address of the service.
    pub fn upstream(namespace: &str, service_name: &str) -> String {
        format!("{service_name}.{namespace}.svc.cluster.local:80")
    }
}

/// Build the configured mapper. The custom-resource mapper needs a client
/// for the cluster that runs the proxy.
pub fn build_mapper(
    kind: ServiceMapperKind,
    layout: RouteLayout,
    client: Option<KubeClient>,
) -> Result<Arc<dyn ServiceMapper>> {
    match kind {
        ServiceMapperKind::Annotation => Ok(Arc::new(AnnotationMapper::new(layout))),
        ServiceMapperKind::CustomResource => {
            let client = client.ok_or_else(|| {
                WsError::Config("custom-resource service mapper needs a cluster client".into())
            })?;
            Ok(Arc::new(CustomResourceMapper::new(client, layout)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_trims_slashes() {
        let layout = RouteLayout::new("https://data.example.org/", "/workspace/proxy/");
        assert_eq!(layout.prefix("ws-1-service"), "/workspace/proxy/ws-1-service/");
        assert_eq!(
            layout.url("ws-1-service"),
            "https://data.example.org/workspace/proxy/ws-1-service/"
        );
    }

    #[test]
    fn test_upstream_address() {
        assert_eq!(
            RouteLayout::upstream("workspaces", "ws-1-service"),
            "ws-1-service.workspaces.svc.cluster.local:80"
        );
    }

    #[test]
    fn test_custom_resource_mapper_requires_client() {
        let layout = RouteLayout::new("https://x", "/p");
        assert!(build_mapper(ServiceMapperKind::CustomResource, layout.clone(), None).is_err());
        assert!(build_mapper(ServiceMapperKind::Annotation, layout, None).is_ok());
    }
}
