//! Pod and service objects for one workspace.

use std::collections::BTreeMap;
use ws_core::{escape_label_value, service_name};

use super::model::{
    Container, ContainerPort, EnvVar, HttpGetAction, ObjectMeta, Pod, PodSecurityContext, PodSpec,
    Probe, ResourceRequirements, SecurityContext, Service, ServicePort, ServiceSpec,
};
use crate::license::LicenseSeat;
use crate::LaunchSpec;

/// Label carrying the workspace id; also the service selector.
pub const APP_LABEL: &str = "app";
/// Label carrying the escaped user name.
pub const WORKSPACE_USER_LABEL: &str = "workspace-user";
/// Label carrying the app definition id.
pub const WORKSPACE_APP_LABEL: &str = "workspace-app";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY: &str = "ws-launcher";

/// Raw user name, kept because labels only hold the escaped form.
pub const USER_ANNOTATION: &str = "workspace/user";
/// License product a seat was checked out for.
pub const LICENSE_ANNOTATION: &str = "workspace/license";

const MAIN_CONTAINER: &str = "workspace";
const SERVICE_PORT: i32 = 80;

/// Label selector matching every workspace object of `user`.
pub fn user_selector(user: &str) -> String {
    format!("{WORKSPACE_USER_LABEL}={}", escape_label_value(user))
}

pub fn workspace_labels(user: &str, workspace_id: &str, app_id: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (APP_LABEL.to_string(), workspace_id.to_string()),
        (WORKSPACE_USER_LABEL.to_string(), escape_label_value(user)),
        (WORKSPACE_APP_LABEL.to_string(), app_id.to_string()),
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string()),
    ])
}

/// Build the workspace pod: the app container plus its sidecars.
pub fn build_pod(spec: &LaunchSpec, namespace: &str, seat: Option<&LicenseSeat>) -> Pod {
    let def = &spec.definition;
    let user = &spec.target.user;

    let mut env: BTreeMap<String, String> = def.env.clone();
    env.insert("WORKSPACE_USER".into(), user.clone());
    env.insert("WORKSPACE_ID".into(), spec.workspace_id.clone());
    env.insert("WORKSPACE_APP".into(), spec.app_id.clone());
    if let Some(seat) = seat {
        env.insert("LICENSE_SEAT".into(), seat.seat_id.clone());
    }

    let main = Container {
        name: MAIN_CONTAINER.to_string(),
        image: def.image.clone(),
        command: def.command.clone(),
        args: def.args.clone(),
        env: env_vars(&env),
        ports: vec![ContainerPort {
            container_port: i32::from(def.target_port),
            protocol: Some("TCP".into()),
        }],
        resources: Some(resources(&def.cpu_limit, &def.memory_limit)),
        readiness_probe: def.ready_probe.as_ref().map(|path| Probe {
            http_get: Some(HttpGetAction {
                path: path.clone(),
                port: i32::from(def.target_port),
                scheme: def.use_tls.then(|| "HTTPS".to_string()),
            }),
            initial_delay_seconds: Some(5),
            period_seconds: Some(10),
            failure_threshold: Some(30),
        }),
        image_pull_policy: Some("IfNotPresent".into()),
        security_context: Some(SecurityContext {
            allow_privilege_escalation: Some(false),
        }),
    };

    let mut containers = vec![main];
    for friend in &def.friends {
        let mut friend_env = friend.env.clone();
        friend_env.insert("WORKSPACE_USER".into(), user.clone());
        containers.push(Container {
            name: friend.name.clone(),
            image: friend.image.clone(),
            command: friend.command.clone(),
            env: env_vars(&friend_env),
            resources: Some(resources(&friend.cpu_limit, &friend.memory_limit)),
            image_pull_policy: Some("IfNotPresent".into()),
            ..Default::default()
        });
    }

    let mut annotations = BTreeMap::from([(USER_ANNOTATION.to_string(), user.clone())]);
    if let Some(seat) = seat {
        annotations.insert(LICENSE_ANNOTATION.to_string(), seat.product.clone());
    }

    let security_context = (def.user_uid.is_some() || def.group_uid.is_some() || def.fs_gid.is_some())
        .then(|| PodSecurityContext {
            run_as_user: def.user_uid,
            run_as_group: def.group_uid,
            fs_group: def.fs_gid,
        });

    Pod {
        api_version: "v1".into(),
        kind: "Pod".into(),
        metadata: ObjectMeta {
            name: Some(spec.workspace_id.clone()),
            namespace: Some(namespace.to_string()),
            labels: workspace_labels(user, &spec.workspace_id, &spec.app_id),
            annotations,
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers,
            restart_policy: Some("Never".into()),
            security_context,
            automount_service_account_token: Some(false),
            termination_grace_period_seconds: Some(30),
        }),
        status: None,
    }
}

/// ClusterIP service fronting the workspace pod on port 80.
pub fn build_service(spec: &LaunchSpec, namespace: &str) -> Service {
    Service {
        api_version: "v1".into(),
        kind: "Service".into(),
        metadata: ObjectMeta {
            name: Some(service_name(&spec.workspace_id)),
            namespace: Some(namespace.to_string()),
            labels: workspace_labels(&spec.target.user, &spec.workspace_id, &spec.app_id),
            annotations: BTreeMap::from([(USER_ANNOTATION.to_string(), spec.target.user.clone())]),
            ..Default::default()
        },
        spec: ServiceSpec {
            selector: BTreeMap::from([(APP_LABEL.to_string(), spec.workspace_id.clone())]),
            ports: vec![ServicePort {
                name: Some("http".into()),
                port: SERVICE_PORT,
                target_port: Some(i32::from(spec.definition.target_port)),
                protocol: Some("TCP".into()),
            }],
            service_type: Some("ClusterIP".into()),
        },
    }
}

fn env_vars(env: &BTreeMap<String, String>) -> Vec<EnvVar> {
    env.iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: value.clone(),
        })
        .collect()
}

// Requests equal limits so workspaces land in the Guaranteed QoS class.
fn resources(cpu: &str, memory: &str) -> ResourceRequirements {
    let quantities = BTreeMap::from([
        ("cpu".to_string(), cpu.to_string()),
        ("memory".to_string(), memory.to_string()),
    ]);
    ResourceRequirements {
        limits: quantities.clone(),
        requests: quantities,
    }
}
