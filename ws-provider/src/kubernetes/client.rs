//! Minimal typed REST client for the Kubernetes API server.

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};
use ws_config::KubernetesSettings;
use ws_core::{Result, WsError};

use super::model::{ApiStatus, ObjectList, Pod, Service};

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Outcome of a create call; an object that already exists is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Created {
    New,
    AlreadyExists,
}

#[derive(Clone)]
pub struct KubeClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl std::fmt::Debug for KubeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl KubeClient {
    /// Client for `base_url`, trusting `ca_pem` in addition to the system roots.
    pub fn new(base_url: impl Into<String>, token: Option<String>, ca_pem: Option<&[u8]>) -> Result<Self> {
        // The API server can stall; never let a request hang forever.
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30));
        if let Some(pem) = ca_pem {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| WsError::Config(format!("Invalid cluster CA certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        let http = builder
            .build()
            .map_err(|e| WsError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Client for the cluster this process runs in.
    ///
    /// An explicit `api_url` wins; otherwise the service-account mount and
    /// `KUBERNETES_SERVICE_*` environment are used.
    pub async fn from_settings(settings: &KubernetesSettings) -> Result<Self> {
        let sa_dir = Path::new(SERVICE_ACCOUNT_DIR);
        let base_url = match &settings.api_url {
            Some(url) => url.clone(),
            None => {
                let host = std::env::var("KUBERNETES_SERVICE_HOST").map_err(|_| {
                    WsError::Config(
                        "kubernetes.api_url is unset and KUBERNETES_SERVICE_HOST is missing".into(),
                    )
                })?;
                let port =
                    std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
                format!("https://{host}:{port}")
            }
        };

        let token_file = settings
            .token_file
            .clone()
            .unwrap_or_else(|| sa_dir.join("token"));
        let token = match tokio::fs::read_to_string(&token_file).await {
            Ok(t) => Some(t.trim().to_string()),
            Err(e) if settings.token_file.is_some() => return Err(e.into()),
            Err(_) => None,
        };

        let ca_file = settings.ca_file.clone().unwrap_or_else(|| sa_dir.join("ca.crt"));
        let ca = match tokio::fs::read(&ca_file).await {
            Ok(bytes) => Some(bytes),
            Err(e) if settings.ca_file.is_some() => return Err(e.into()),
            Err(_) => None,
        };

        Self::new(base_url, token, ca.as_deref())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>> {
        self.get(&pods_path(namespace, Some(name))).await
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>> {
        self.list(&pods_path(namespace, None), label_selector).await
    }

    pub async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Created> {
        self.create(&pods_path(namespace, None), pod).await
    }

    /// Returns `false` when the pod was already gone.
    pub async fn delete_pod(&self, namespace: &str, name: &str) -> Result<bool> {
        self.delete(&pods_path(namespace, Some(name))).await
    }

    pub async fn list_services(&self, namespace: &str, label_selector: &str) -> Result<Vec<Service>> {
        self.list(&services_path(namespace, None), label_selector).await
    }

    pub async fn create_service(&self, namespace: &str, service: &Service) -> Result<Created> {
        self.create(&services_path(namespace, None), service).await
    }

    pub async fn delete_service(&self, namespace: &str, name: &str) -> Result<bool> {
        self.delete(&services_path(namespace, Some(name))).await
    }

    pub async fn create_custom_object<T: Serialize + ?Sized>(
        &self,
        resource: &CustomResource<'_>,
        namespace: &str,
        body: &T,
    ) -> Result<Created> {
        self.create(&resource.path(namespace, None), body).await
    }

    pub async fn delete_custom_object(
        &self,
        resource: &CustomResource<'_>,
        namespace: &str,
        name: &str,
    ) -> Result<bool> {
        self.delete(&resource.path(namespace, Some(name))).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let resp = self.send(self.request(Method::GET, path)).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(decode(check(resp).await?).await?))
    }

    async fn list<T: DeserializeOwned>(&self, path: &str, label_selector: &str) -> Result<Vec<T>> {
        let req = self
            .request(Method::GET, path)
            .query(&[("labelSelector", label_selector)]);
        let list: ObjectList<T> = decode(check(self.send(req).await?).await?).await?;
        Ok(list.items)
    }

    async fn create<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Created> {
        let resp = self.send(self.request(Method::POST, path).json(body)).await?;
        if resp.status() == StatusCode::CONFLICT {
            debug!(path, "Object already exists");
            return Ok(Created::AlreadyExists);
        }
        check(resp).await?;
        Ok(Created::New)
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let resp = self.send(self.request(Method::DELETE, path)).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(resp).await?;
        Ok(true)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self.http.request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response> {
        req.send()
            .await
            .map_err(|e| WsError::Network(format!("Kubernetes API unreachable: {e}")))
    }
}

/// Group, version and plural name of a custom resource type.
#[derive(Debug, Clone, Copy)]
pub struct CustomResource<'a> {
    pub group: &'a str,
    pub version: &'a str,
    pub plural: &'a str,
}

impl CustomResource<'_> {
    fn path(&self, namespace: &str, name: Option<&str>) -> String {
        let base = format!(
            "/apis/{}/{}/namespaces/{}/{}",
            self.group, self.version, namespace, self.plural
        );
        match name {
            Some(name) => format!("{base}/{name}"),
            None => base,
        }
    }
}

fn pods_path(namespace: &str, name: Option<&str>) -> String {
    core_path("pods", namespace, name)
}

fn services_path(namespace: &str, name: Option<&str>) -> String {
    core_path("services", namespace, name)
}

fn core_path(kind: &str, namespace: &str, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("/api/v1/namespaces/{namespace}/{kind}/{name}"),
        None => format!("/api/v1/namespaces/{namespace}/{kind}"),
    }
}

/// Turn a non-success response into [`WsError::ClusterApi`].
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiStatus>(&text)
        .ok()
        .map(|s| s.message)
        .filter(|m| !m.is_empty())
        .unwrap_or(text);
    Err(WsError::ClusterApi {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    resp.json::<T>()
        .await
        .map_err(|e| WsError::Serialization(format!("Unexpected Kubernetes API response: {e}")))
}
