use async_trait::async_trait;
use aws_sdk_ecs::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_ecs::types::{
    AssignPublicIp, AwsVpcConfiguration, Compatibility, ContainerDefinition, KeyValuePair, LaunchType,
    LoadBalancer, NetworkConfiguration, NetworkMode, PortMapping, TransportProtocol,
};
use aws_sdk_ecs::Client;
use tracing::{debug, info, instrument};
use ws_config::ManagedContainerSettings;
use ws_core::{PayModel, Result, WsError};

use super::{ContainerService, ServiceState, TaskSpec};
use crate::aws::AwsSessions;

/// `DescribeServices` accepts at most this many names per call.
const DESCRIBE_BATCH: usize = 10;

/// Delete error codes meaning there is nothing left to delete.
const GONE_CODES: [&str; 2] = ["ServiceNotFoundException", "ServiceNotActiveException"];

fn already_gone(code: Option<&str>) -> bool {
    code.is_some_and(|c| GONE_CODES.contains(&c))
}

/// [`ContainerService`] backed by ECS on Fargate.
pub struct EcsContainerService {
    sessions: AwsSessions,
    settings: ManagedContainerSettings,
}

impl EcsContainerService {
    pub fn new(sessions: AwsSessions, settings: ManagedContainerSettings) -> Self {
        Self { sessions, settings }
    }

    async fn client(&self, paymodel: &PayModel) -> Result<Client> {
        let session = self
            .sessions
            .assume(&paymodel.aws_account_id, &paymodel.region, &self.settings.role_name)
            .await?;
        Ok(Client::new(&session.config))
    }

    async fn register_task(&self, client: &Client, task: &TaskSpec) -> Result<String> {
        let env = task
            .env
            .iter()
            .map(|(k, v)| KeyValuePair::builder().name(k).value(v).build())
            .collect::<Vec<_>>();
        let container = ContainerDefinition::builder()
            .name(&task.name)
            .image(&task.image)
            .essential(true)
            .port_mappings(
                PortMapping::builder()
                    .container_port(i32::from(task.port))
                    .protocol(TransportProtocol::Tcp)
                    .build(),
            )
            .set_environment(Some(env))
            .set_command((!task.command.is_empty()).then(|| task.command.clone()))
            .build();

        let out = client
            .register_task_definition()
            .family(&task.name)
            .requires_compatibilities(Compatibility::Fargate)
            .network_mode(NetworkMode::Awsvpc)
            .cpu(task.cpu_units.to_string())
            .memory(task.memory_mib.to_string())
            .container_definitions(container)
            .set_execution_role_arn(self.settings.execution_role_arn.clone())
            .set_task_role_arn(self.settings.task_role_arn.clone())
            .send()
            .await
            .map_err(|e| aws_error("register task definition", &DisplayErrorContext(&e)))?;

        out.task_definition()
            .and_then(|t| t.task_definition_arn())
            .map(str::to_string)
            .ok_or_else(|| WsError::Aws("Task definition registered without an ARN".into()))
    }

    fn network(&self) -> Result<NetworkConfiguration> {
        let vpc = AwsVpcConfiguration::builder()
            .set_subnets(Some(self.settings.subnets.clone()))
            .set_security_groups(Some(self.settings.security_groups.clone()))
            .assign_public_ip(if self.settings.assign_public_ip {
                AssignPublicIp::Enabled
            } else {
                AssignPublicIp::Disabled
            })
            .build()
            .map_err(|e| WsError::Config(format!("Invalid managed-container network: {e}")))?;
        Ok(NetworkConfiguration::builder().awsvpc_configuration(vpc).build())
    }
}

#[async_trait]
impl ContainerService for EcsContainerService {
    #[instrument(skip_all, fields(service = %task.name))]
    async fn ensure_service(&self, paymodel: &PayModel, task: &TaskSpec) -> Result<()> {
        let client = self.client(paymodel).await?;

        let existing = describe(&client, &self.settings.cluster_name, std::slice::from_ref(&task.name)).await?;
        if existing.iter().any(|s| s.status.as_deref() == Some("ACTIVE")) {
            debug!("Service already active");
            return Ok(());
        }

        let task_definition = self.register_task(&client, task).await?;
        let load_balancers = self.settings.target_group_arn.as_ref().map(|arn| {
            vec![LoadBalancer::builder()
                .target_group_arn(arn)
                .container_name(&task.name)
                .container_port(i32::from(task.port))
                .build()]
        });

        client
            .create_service()
            .cluster(&self.settings.cluster_name)
            .service_name(&task.name)
            .task_definition(&task_definition)
            .desired_count(1)
            .launch_type(LaunchType::Fargate)
            .network_configuration(self.network()?)
            .set_load_balancers(load_balancers)
            .send()
            .await
            .map_err(|e| aws_error("create service", &DisplayErrorContext(&e)))?;

        info!(task_definition = %task_definition, "Created ECS service");
        Ok(())
    }

    async fn describe_services(&self, paymodel: &PayModel, names: &[String]) -> Result<Vec<ServiceState>> {
        let client = self.client(paymodel).await?;
        describe(&client, &self.settings.cluster_name, names).await
    }

    #[instrument(skip_all, fields(service = %name))]
    async fn delete_service(&self, paymodel: &PayModel, name: &str) -> Result<()> {
        let client = self.client(paymodel).await?;
        let result = client
            .delete_service()
            .cluster(&self.settings.cluster_name)
            .service(name)
            .force(true)
            .send()
            .await;

        match result {
            Ok(_) => {
                info!("Deleted ECS service");
                Ok(())
            }
            Err(e) if already_gone(e.as_service_error().and_then(|se| se.code())) => {
                debug!("ECS service already gone");
                Ok(())
            }
            Err(e) => Err(aws_error("delete service", &DisplayErrorContext(&e))),
        }
    }
}

async fn describe(client: &Client, cluster: &str, names: &[String]) -> Result<Vec<ServiceState>> {
    let mut states = Vec::with_capacity(names.len());
    for batch in names.chunks(DESCRIBE_BATCH) {
        let out = client
            .describe_services()
            .cluster(cluster)
            .set_services(Some(batch.to_vec()))
            .send()
            .await
            .map_err(|e| aws_error("describe services", &DisplayErrorContext(&e)))?;

        for name in batch {
            let status = out
                .services()
                .iter()
                .find(|s| s.service_name() == Some(name.as_str()))
                .and_then(|s| s.status())
                .map(str::to_string);
            states.push(ServiceState {
                name: name.clone(),
                status,
            });
        }
    }
    Ok(states)
}

fn aws_error(action: &str, err: &dyn std::fmt::Display) -> WsError {
    WsError::Aws(format!("Failed to {action}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_gone_codes() {
        assert!(already_gone(Some("ServiceNotFoundException")));
        assert!(already_gone(Some("ServiceNotActiveException")));
        assert!(!already_gone(Some("AccessDeniedException")));
        assert!(!already_gone(None));
    }
}
