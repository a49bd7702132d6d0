use async_trait::async_trait;
use std::sync::OnceLock;
use tera::{Context as TeraContext, Tera};
use ws_core::{Result, WsError};

use super::{Route, RouteLayout, ServiceMapper};
use crate::kubernetes::model::Service;

/// Annotation the proxy reads routing documents from.
pub const ROUTE_ANNOTATION: &str = "getambassador.io/config";

static MAPPING_TERA: OnceLock<Tera> = OnceLock::new();

fn mapping_tera() -> &'static Tera {
    MAPPING_TERA.get_or_init(|| {
        let mut tera = Tera::default();
        tera.add_raw_template("mapping.yaml", include_str!("mapping.yaml.j2"))
            .expect("Failed to add mapping template");
        tera
    })
}

/// Writes the route as an annotation on the service object itself.
///
/// The route lives and dies with the service, so `stop` has nothing to do.
#[derive(Debug, Clone)]
pub struct AnnotationMapper {
    layout: RouteLayout,
}

impl AnnotationMapper {
    pub fn new(layout: RouteLayout) -> Self {
        Self { layout }
    }

    fn render(&self, route: &Route<'_>) -> Result<String> {
        let mut context = TeraContext::new();
        context.insert("mapping_name", &RouteLayout::mapping_name(route.service_name));
        context.insert("prefix", &self.layout.prefix(route.service_name));
        context.insert(
            "upstream",
            &RouteLayout::upstream(route.namespace, route.service_name),
        );
        context.insert("path_rewrite", route.path_rewrite);
        context.insert("user_name", route.user_name);
        context.insert("use_tls", &route.use_tls);

        mapping_tera()
            .render("mapping.yaml", &context)
            .map_err(|e| WsError::Internal(format!("Failed to render mapping template: {e}")))
    }
}

#[async_trait]
impl ServiceMapper for AnnotationMapper {
    async fn start(&self, route: &Route<'_>, service: &mut Service) -> Result<()> {
        let document = self.render(route)?;
        service
            .metadata
            .annotations
            .insert(ROUTE_ANNOTATION.to_string(), document);
        Ok(())
    }

    async fn stop(&self, _namespace: &str, _service_name: &str) -> Result<()> {
        Ok(())
    }

    async fn get_url(&self, _namespace: &str, service_name: &str) -> Result<String> {
        Ok(self.layout.url(service_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(use_tls: bool) -> Route<'static> {
        Route {
            namespace: "workspaces",
            service_name: "ws-1-service",
            user_name: "alice@example.org",
            path_rewrite: "/lab/",
            use_tls,
        }
    }

    fn mapper() -> AnnotationMapper {
        AnnotationMapper::new(RouteLayout::new("https://data.example.org", "/workspace/proxy"))
    }

    #[tokio::test]
    async fn test_start_annotates_service() {
        let mut service = Service::default();
        mapper().start(&route(false), &mut service).await.unwrap();

        let doc = &service.metadata.annotations[ROUTE_ANNOTATION];
        assert!(doc.contains("name: ws-1-service-mapping"));
        assert!(doc.contains("prefix: /workspace/proxy/ws-1-service/"));
        assert!(doc.contains("service: ws-1-service.workspaces.svc.cluster.local:80"));
        assert!(doc.contains("remote_user: \"alice@example.org\""));
        assert!(doc.contains("rewrite: \"/lab/\""));
        assert!(!doc.contains("tls: true"));
    }

    #[tokio::test]
    async fn test_start_twice_is_stable() {
        let mapper = mapper();
        let mut service = Service::default();
        mapper.start(&route(true), &mut service).await.unwrap();
        let first = service.metadata.annotations.clone();
        mapper.start(&route(true), &mut service).await.unwrap();

        assert_eq!(service.metadata.annotations, first);
        assert_eq!(service.metadata.annotations.len(), 1);
        assert!(first[ROUTE_ANNOTATION].contains("tls: true"));

        let url = mapper.get_url("workspaces", "ws-1-service").await.unwrap();
        assert_eq!(url, "https://data.example.org/workspace/proxy/ws-1-service/");
    }

    #[tokio::test]
    async fn test_stop_unknown_route_is_noop() {
        mapper().stop("workspaces", "never-started").await.unwrap();
    }
}
