use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use ws_config::ContainerDefinition;
use ws_core::{escape_label_value, workspace_id, BackendKind};
use ws_provider::kubernetes::KubeClient;
use ws_provider::local::local_backend;
use ws_provider::mapper::{AnnotationMapper, RouteLayout, ROUTE_ANNOTATION};
use ws_provider::{Backend, CanonicalStatus, LaunchSpec, WorkspaceTarget};

const PODS: &str = "/api/v1/namespaces/workspaces/pods";
const SERVICES: &str = "/api/v1/namespaces/workspaces/services";

fn definition() -> ContainerDefinition {
    serde_json::from_value(json!({
        "name": "Notebook",
        "image": "quay.io/lab/notebook:1.0",
        "cpu_limit": "1",
        "memory_limit": "2Gi"
    }))
    .unwrap()
}

fn backend(server: &MockServer) -> impl Backend {
    let client = KubeClient::new(server.uri(), Some("t".into()), None).unwrap();
    let mapper = Arc::new(AnnotationMapper::new(RouteLayout::new(
        "https://data.example.org",
        "/workspace/proxy",
    )));
    local_backend(client, "workspaces", mapper)
}

fn labelled(kind: &str, id: &str, app_id: &str, extra: serde_json::Value) -> serde_json::Value {
    owned_by("alice", kind, id, app_id, extra)
}

fn owned_by(user: &str, kind: &str, id: &str, app_id: &str, extra: serde_json::Value) -> serde_json::Value {
    let name = if kind == "pod" {
        id.to_string()
    } else {
        format!("{id}-service")
    };
    let mut value = json!({
        "metadata": {
            "name": name,
            "labels": {"app": id, "workspace-user": escape_label_value(user), "workspace-app": app_id},
            "annotations": {"workspace/user": user}
        }
    });
    if let (Some(obj), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
        obj.extend(extra.clone());
    }
    value
}

#[tokio::test]
async fn test_create_submits_pod_then_annotated_service() {
    let server = MockServer::start().await;
    let def = definition();
    let app_id = def.id();
    let id = workspace_id("alice", &app_id);

    Mock::given(method("GET"))
        .and(path(format!("{PODS}/{id}")))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PODS))
        .and(body_partial_json(json!({"metadata": {"name": id, "labels": {"workspace-user": "ualice"}}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SERVICES))
        .and(body_partial_json(json!({"metadata": {"name": format!("{id}-service")}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend(&server);
    assert_eq!(backend.kind(), BackendKind::Local);
    let spec = LaunchSpec::new(WorkspaceTarget::new("alice"), &app_id, def);
    backend.create(&spec).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let service_body: serde_json::Value = requests
        .iter()
        .find(|r| r.url.path() == SERVICES)
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .unwrap();
    let annotation = service_body["metadata"]["annotations"][ROUTE_ANNOTATION]
        .as_str()
        .unwrap();
    assert!(annotation.contains(&format!("prefix: /workspace/proxy/{id}-service/")));
}

#[tokio::test]
async fn test_create_refuses_while_previous_pod_terminates() {
    let server = MockServer::start().await;
    let def = definition();
    let app_id = def.id();
    let id = workspace_id("alice", &app_id);

    let mut pod = labelled("pod", &id, &app_id, json!({"status": {"phase": "Running"}}));
    pod["metadata"]["deletionTimestamp"] = json!("2024-01-01T00:00:00Z");
    Mock::given(method("GET"))
        .and(path(format!("{PODS}/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(pod))
        .mount(&server)
        .await;

    let spec = LaunchSpec::new(WorkspaceTarget::new("alice"), &app_id, def);
    let err = backend(&server).create(&spec).await.unwrap_err();
    assert!(err.to_string().contains("still terminating"));
}

#[tokio::test]
async fn test_status_reports_pods_and_orphaned_services() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PODS))
        .and(query_param("labelSelector", "workspace-user=ualice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [labelled("pod", "ws-a", "app-a", json!({
                "status": {
                    "phase": "Running",
                    "conditions": [
                        {"type": "Ready", "status": "True"},
                        {"type": "PodScheduled", "status": "True"}
                    ]
                }
            }))]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SERVICES))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                labelled("service", "ws-a", "app-a", json!({})),
                labelled("service", "ws-b", "app-b", json!({}))
            ]
        })))
        .mount(&server)
        .await;

    let statuses = backend(&server)
        .status(&WorkspaceTarget::new("alice"))
        .await
        .unwrap();

    assert_eq!(statuses.len(), 2);
    assert!(statuses[0].is(CanonicalStatus::Running));
    assert_eq!(
        statuses[0].url.as_deref(),
        Some("https://data.example.org/workspace/proxy/ws-a-service/")
    );
    assert!(statuses[1].is(CanonicalStatus::Terminating));
    assert_eq!(statuses[1].workspace_id.as_deref(), Some("ws-b"));
}

#[tokio::test]
async fn test_status_without_objects_is_empty() {
    let server = MockServer::start().await;
    for p in [PODS, SERVICES] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;
    }

    let statuses = backend(&server)
        .status(&WorkspaceTarget::new("alice"))
        .await
        .unwrap();
    assert!(statuses.is_empty());
}

#[tokio::test]
async fn test_terminate_one_workspace_leaves_the_others() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PODS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                labelled("pod", "ws-a", "app-a", json!({})),
                labelled("pod", "ws-b", "app-b", json!({}))
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SERVICES))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [labelled("service", "ws-a", "app-a", json!({}))]
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{PODS}/ws-a")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{SERVICES}/ws-a-service")))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{PODS}/ws-b")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    backend(&server)
        .terminate(&WorkspaceTarget::new("alice"), Some("ws-a"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_objects_of_another_user_are_left_alone() {
    let server = MockServer::start().await;
    // The listing hands back objects of a second user sharing the label value.
    let label = escape_label_value("A@x.org");
    let mut foreign = owned_by("uA@x.org", "pod", "ws-theirs", "app-b", json!({"status": {"phase": "Running"}}));
    foreign["metadata"]["labels"]["workspace-user"] = json!(label);
    Mock::given(method("GET"))
        .and(path(PODS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                owned_by("A@x.org", "pod", "ws-mine", "app-a", json!({"status": {"phase": "Pending"}})),
                foreign
            ]
        })))
        .mount(&server)
        .await;
    let mut foreign_svc = owned_by("uA@x.org", "service", "ws-theirs", "app-b", json!({}));
    foreign_svc["metadata"]["labels"]["workspace-user"] = json!(label);
    Mock::given(method("GET"))
        .and(path(SERVICES))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [foreign_svc]})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{PODS}/ws-mine")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{SERVICES}/ws-mine-service")))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{PODS}/ws-theirs")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{SERVICES}/ws-theirs-service")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let backend = backend(&server);
    let target = WorkspaceTarget::new("A@x.org");

    let statuses = backend.status(&target).await.unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].workspace_id.as_deref(), Some("ws-mine"));
    assert!(statuses[0].is(CanonicalStatus::Launching));

    backend.terminate(&target, None).await.unwrap();
}
