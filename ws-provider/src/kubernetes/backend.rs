use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use ws_core::{service_name, BackendKind, Result, WsError};

use super::client::KubeClient;
use super::model::ObjectMeta;
use super::pod::{
    build_pod, build_service, user_selector, APP_LABEL, LICENSE_ANNOTATION, USER_ANNOTATION,
    WORKSPACE_APP_LABEL,
};
use crate::license::{LicenseSeats, NoLicenses};
use crate::mapper::{Route, ServiceMapper};
use crate::status::{normalize_pod, CanonicalStatus, WorkspaceStatus};
use crate::{Backend, LaunchSpec, WorkspaceTarget};

/// A connected cluster plus the namespace workspaces live in.
#[derive(Debug, Clone)]
pub struct ClusterHandle {
    pub client: KubeClient,
    pub namespace: String,
}

/// How a Kubernetes backend reaches the cluster for a given caller.
#[async_trait]
pub trait ClusterSource: Send + Sync {
    async fn connect(&self, target: &WorkspaceTarget) -> Result<ClusterHandle>;
}

/// Labels only narrow the listing; the raw user annotation decides ownership.
fn owned_by(meta: &ObjectMeta, user: &str) -> bool {
    meta.annotations.get(USER_ANNOTATION).map(String::as_str) == Some(user)
}

/// Workspaces as a pod plus a routed ClusterIP service.
pub struct KubernetesBackend<S> {
    kind: BackendKind,
    source: S,
    mapper: Arc<dyn ServiceMapper>,
    seats: Arc<dyn LicenseSeats>,
}

impl<S: ClusterSource> KubernetesBackend<S> {
    pub fn new(kind: BackendKind, source: S, mapper: Arc<dyn ServiceMapper>) -> Self {
        Self {
            kind,
            source,
            mapper,
            seats: Arc::new(NoLicenses),
        }
    }

    pub fn with_license_seats(mut self, seats: Arc<dyn LicenseSeats>) -> Self {
        self.seats = seats;
        self
    }

    async fn checkout_seat(&self, spec: &LaunchSpec) -> Result<Option<crate::license::LicenseSeat>> {
        let Some(product) = &spec.definition.license else {
            return Ok(None);
        };
        let seat = self
            .seats
            .checkout(&spec.target.user, product)
            .await?
            .ok_or_else(|| WsError::Backend(format!("No license seat available for {product}")))?;
        Ok(Some(seat))
    }
}

#[async_trait]
impl<S: ClusterSource + 'static> Backend for KubernetesBackend<S> {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    #[instrument(skip_all, fields(backend = %self.kind, user = %spec.target.user, workspace = %spec.workspace_id))]
    async fn create(&self, spec: &LaunchSpec) -> Result<()> {
        let cluster = self.source.connect(&spec.target).await?;
        let ns = cluster.namespace.as_str();

        match cluster.client.get_pod(ns, &spec.workspace_id).await? {
            Some(pod) if pod.metadata.deletion_timestamp.is_some() => {
                return Err(WsError::Backend(format!(
                    "Workspace {} is still terminating",
                    spec.workspace_id
                )));
            }
            Some(_) => debug!("Workspace pod already exists"),
            None => {
                let seat = self.checkout_seat(spec).await?;
                let pod = build_pod(spec, ns, seat.as_ref());
                if let Err(e) = cluster.client.create_pod(ns, &pod).await {
                    if let Some(seat) = &seat {
                        if let Err(release_err) = self.seats.release(&spec.target.user, &seat.product).await {
                            warn!("Failed to release license seat: {release_err}");
                        }
                    }
                    return Err(e);
                }
                info!("Created workspace pod");
            }
        }

        let svc_name = service_name(&spec.workspace_id);
        let mut service = build_service(spec, ns);
        let route = Route {
            namespace: ns,
            service_name: &svc_name,
            user_name: &spec.target.user,
            path_rewrite: &spec.definition.path_rewrite,
            use_tls: spec.definition.use_tls,
        };
        self.mapper.start(&route, &mut service).await?;
        cluster.client.create_service(ns, &service).await?;
        info!(service = %svc_name, "Workspace service registered");
        Ok(())
    }

    #[instrument(skip_all, fields(backend = %self.kind, user = %target.user))]
    async fn terminate(&self, target: &WorkspaceTarget, workspace_id: Option<&str>) -> Result<()> {
        let cluster = self.source.connect(target).await?;
        let ns = cluster.namespace.as_str();
        let selector = user_selector(&target.user);
        let wanted = |id: Option<&String>| match (workspace_id, id) {
            (None, Some(_)) => true,
            (Some(w), Some(id)) => w == id.as_str(),
            (_, None) => false,
        };

        let mut pods = cluster.client.list_pods(ns, &selector).await?;
        pods.retain(|p| owned_by(&p.metadata, &target.user));
        let mut services = cluster.client.list_services(ns, &selector).await?;
        services.retain(|s| owned_by(&s.metadata, &target.user));

        let mut ids = BTreeSet::new();
        for pod in pods.iter().filter(|p| wanted(p.metadata.labels.get(APP_LABEL))) {
            let Some(name) = pod.metadata.name.as_deref() else {
                continue;
            };
            if cluster.client.delete_pod(ns, name).await? {
                info!(pod = name, "Deleted workspace pod");
            }
            if let Some(product) = pod.metadata.annotations.get(LICENSE_ANNOTATION) {
                self.seats.release(&target.user, product).await?;
            }
            ids.extend(pod.metadata.labels.get(APP_LABEL).cloned());
        }
        for svc in services.iter().filter(|s| wanted(s.metadata.labels.get(APP_LABEL))) {
            ids.extend(svc.metadata.labels.get(APP_LABEL).cloned());
        }

        if ids.is_empty() {
            debug!("No workspace objects to delete");
        }
        for id in &ids {
            let svc_name = service_name(id);
            self.mapper.stop(ns, &svc_name).await?;
            if cluster.client.delete_service(ns, &svc_name).await? {
                info!(service = %svc_name, "Deleted workspace service");
            }
        }
        Ok(())
    }

    #[instrument(skip_all, level = "debug", fields(backend = %self.kind, user = %target.user))]
    async fn status(&self, target: &WorkspaceTarget) -> Result<Vec<WorkspaceStatus>> {
        let cluster = self.source.connect(target).await?;
        let ns = cluster.namespace.as_str();
        let selector = user_selector(&target.user);

        let mut pods = cluster.client.list_pods(ns, &selector).await?;
        pods.retain(|p| owned_by(&p.metadata, &target.user));
        let mut services = cluster.client.list_services(ns, &selector).await?;
        services.retain(|s| owned_by(&s.metadata, &target.user));

        let mut statuses = Vec::with_capacity(pods.len());
        for pod in &pods {
            let mut view = normalize_pod(Some(pod));
            if let Some(id) = &view.workspace_id {
                view.url = Some(self.mapper.get_url(ns, &service_name(id)).await?);
            }
            statuses.push(view);
        }

        // A service outliving its pod means teardown is still in progress.
        for svc in &services {
            let id = svc.metadata.labels.get(APP_LABEL);
            if statuses.iter().any(|s| s.workspace_id.as_ref() == id) {
                continue;
            }
            statuses.push(WorkspaceStatus {
                status: Some(CanonicalStatus::Terminating),
                workspace_id: id.cloned(),
                app_id: svc.metadata.labels.get(WORKSPACE_APP_LABEL).cloned(),
                ..Default::default()
            });
        }

        statuses.sort_by(|a, b| a.workspace_id.cmp(&b.workspace_id));
        Ok(statuses)
    }
}
