//! Ephemeral servers running in disposable `postgres` containers.
//!
//! Containers are also recorded in a process-wide registry so that `main` can
//! remove anything left behind when the process is interrupted.

use anyhow::{Result, anyhow};
use bollard::Docker;
use bollard::container::LogOutput;
use bollard::models::{ContainerCreateBody, ContainerStateStatusEnum};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, InspectContainerOptions, LogsOptionsBuilder,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::secret::{ContainerInspectResponse, HostConfig, PortBinding};
use futures_util::StreamExt;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{EphemeralDatabase, Provisioner, ServerProcess};
use crate::config::Ephemeral;
use crate::constants::{EPHEMERAL_DATABASE, EPHEMERAL_PASSWORD, EPHEMERAL_SUPERUSER};
use crate::db::{self, ConnectionConfig};
use crate::error::{PipelineError, PipelineResult};

const POSTGRES_PORT: &str = "5432/tcp";
const CLEANUP_TIMEOUT_SECS: u64 = 10;

static CONTAINER_REGISTRY: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(Vec::new()));

fn register_container(id: &str) {
    if let Ok(mut registry) = CONTAINER_REGISTRY.lock() {
        registry.push(id.to_string());
    }
}

fn unregister_container(id: &str) {
    if let Ok(mut registry) = CONTAINER_REGISTRY.lock() {
        registry.retain(|existing| existing != id);
    }
}

/// Number of containers started by this process and not yet removed
pub fn registered_container_count() -> usize {
    CONTAINER_REGISTRY.lock().map(|r| r.len()).unwrap_or(0)
}

/// Force-remove every container still in the registry
pub async fn cleanup_all_containers() -> Result<()> {
    let ids: Vec<String> = match CONTAINER_REGISTRY.lock() {
        Ok(mut registry) => registry.drain(..).collect(),
        Err(_) => return Ok(()),
    };
    if ids.is_empty() {
        return Ok(());
    }

    info!("Cleaning up {} leftover container(s)", ids.len());
    let docker = DockerClient::connect().await?;
    let removals = ids.iter().map(|id| docker.remove(id));

    if tokio::time::timeout(
        Duration::from_secs(CLEANUP_TIMEOUT_SECS),
        futures_util::future::join_all(removals),
    )
    .await
    .is_err()
    {
        warn!("Container cleanup timed out after {} seconds", CLEANUP_TIMEOUT_SECS);
    }
    Ok(())
}

struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Connect through `DOCKER_HOST` or the platform default socket
    async fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| anyhow!("Failed to connect to Docker daemon: {}", e))?;
        docker
            .ping()
            .await
            .map_err(|e| anyhow!("Docker daemon not responding: {}", e))?;
        Ok(Self { docker })
    }

    async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }

        debug!("Pulling image {}", image);
        let options = CreateImageOptions {
            from_image: Some(image.to_string()),
            ..Default::default()
        };
        let mut pull = self.docker.create_image(Some(options), None, None);
        while let Some(progress) = pull.next().await {
            progress.map_err(|e| anyhow!("Failed to pull image {}: {}", image, e))?;
        }
        Ok(())
    }

    async fn create_and_start(&self, name: &str, image: &str, port: Option<u16>) -> Result<String> {
        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            POSTGRES_PORT.to_string(),
            Some(vec![PortBinding {
                host_ip: Some("127.0.0.1".to_string()),
                host_port: port.map(|p| p.to_string()),
            }]),
        );

        let body = ContainerCreateBody {
            image: Some(image.to_string()),
            env: Some(vec![
                format!("POSTGRES_USER={}", EPHEMERAL_SUPERUSER),
                format!("POSTGRES_PASSWORD={}", EPHEMERAL_PASSWORD),
                format!("POSTGRES_DB={}", EPHEMERAL_DATABASE),
            ]),
            cmd: Some(vec!["postgres".to_string(), "-c".to_string(), "fsync=off".to_string()]),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                ..Default::default()
            }),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: Some(name.to_string()),
            ..Default::default()
        };
        let container = self
            .docker
            .create_container(Some(options), body)
            .await
            .map_err(|e| anyhow!("Failed to create container: {}", e))?;

        if let Err(e) = self
            .docker
            .start_container(&container.id, None::<StartContainerOptions>)
            .await
        {
            let _ = self.remove(&container.id).await;
            return Err(anyhow!("Failed to start container: {}", e));
        }

        Ok(container.id)
    }

    async fn inspect(&self, id: &str) -> Result<ContainerInspectResponse> {
        self.docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| anyhow!("Failed to inspect container: {}", e))
    }

    async fn host_port(&self, id: &str) -> Result<u16> {
        let inspect = self.inspect(id).await?;
        let host_port = inspect
            .network_settings
            .as_ref()
            .and_then(|settings| settings.ports.as_ref())
            .and_then(|ports| ports.get(POSTGRES_PORT))
            .and_then(|bindings| bindings.as_ref())
            .and_then(|bindings| bindings.first())
            .and_then(|binding| binding.host_port.as_ref())
            .ok_or_else(|| anyhow!("Container has no host port bound to {}", POSTGRES_PORT))?;

        host_port
            .parse::<u16>()
            .map_err(|e| anyhow!("Invalid host port '{}': {}", host_port, e))
    }

    /// Retry connections until the server answers, failing fast if the
    /// container exits underneath us
    async fn wait_until_ready(&self, id: &str, dsn: &str, connection: &ConnectionConfig) -> Result<()> {
        let single_attempt = ConnectionConfig {
            max_retries: 0,
            ..connection.clone()
        };
        let mut last_error = None;

        for attempt in 0..=connection.max_retries {
            if let Some(state) = self.inspect(id).await?.state
                && matches!(
                    state.status,
                    Some(ContainerStateStatusEnum::EXITED) | Some(ContainerStateStatusEnum::DEAD)
                )
            {
                return Err(anyhow!(
                    "container exited with code {}",
                    state.exit_code.unwrap_or(-1)
                ));
            }

            match super::wait_until_ready(dsn, &single_attempt).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!("Container not ready (attempt {}): {}", attempt + 1, e);
                    last_error = Some(e);
                    if attempt < connection.max_retries {
                        tokio::time::sleep(connection.retry_delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("no readiness attempts made")))
    }

    async fn logs(&self, id: &str) -> String {
        let options = LogsOptionsBuilder::new()
            .stdout(true)
            .stderr(true)
            .tail("30")
            .build();
        let stream = self.docker.logs(id, Some(options));

        match tokio::time::timeout(
            Duration::from_secs(3),
            stream.collect::<Vec<Result<LogOutput, _>>>(),
        )
        .await
        {
            Ok(chunks) => chunks
                .into_iter()
                .filter_map(|chunk| chunk.ok())
                .map(|chunk| chunk.to_string())
                .collect(),
            Err(_) => "(timed out fetching container logs)".to_string(),
        }
    }

    /// Stop and force-remove; a container that is already gone counts as removed
    async fn remove(&self, id: &str) -> Result<()> {
        if let Err(e) = self
            .docker
            .stop_container(id, None::<StopContainerOptions>)
            .await
        {
            debug!("Stopping container {} failed: {}", id, e);
        }

        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        let result = self.docker.remove_container(id, Some(options)).await;
        unregister_container(id);

        match result {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e.to_string()) => Ok(()),
            Err(e) => Err(anyhow!("Failed to remove container {}: {}", id, e)),
        }
    }
}

fn is_not_found(message: &str) -> bool {
    message.contains("404") || message.contains("No such container")
}

pub struct DockerProvisioner {
    image: String,
    connection: ConnectionConfig,
}

impl DockerProvisioner {
    pub fn new(ephemeral: &Ephemeral) -> Self {
        Self {
            image: ephemeral.resolved_image(),
            connection: ConnectionConfig::from(ephemeral),
        }
    }

    async fn start(&self, name: &str, instance_dir: &Path, port: Option<u16>) -> Result<EphemeralDatabase> {
        std::fs::create_dir_all(instance_dir)?;

        let client = DockerClient::connect().await?;
        client.ensure_image(&self.image).await?;

        let container_name = format!("modelmig_{}_{}", name, uuid::Uuid::new_v4().simple());
        let id = client.create_and_start(&container_name, &self.image, port).await?;
        register_container(&id);

        let host_port = match client.host_port(&id).await {
            Ok(port) => port,
            Err(e) => {
                let _ = client.remove(&id).await;
                return Err(e);
            }
        };
        let dsn = format!(
            "postgres://{}:{}@127.0.0.1:{}/{}?sslmode=disable",
            EPHEMERAL_SUPERUSER, EPHEMERAL_PASSWORD, host_port, EPHEMERAL_DATABASE
        );

        if let Err(e) = client.wait_until_ready(&id, &dsn, &self.connection).await {
            let logs = client.logs(&id).await;
            let _ = client.remove(&id).await;
            return Err(e.context(format!(
                "container {} ({}) never became ready; last logs:\n{}",
                container_name,
                db::mask_url_password(&dsn),
                logs
            )));
        }

        Ok(EphemeralDatabase::new(
            name,
            instance_dir,
            host_port,
            dsn,
            Box::new(ContainerServer { id }),
        ))
    }
}

impl Provisioner for DockerProvisioner {
    async fn provision(
        &self,
        name: &str,
        instance_dir: &Path,
        port: Option<u16>,
    ) -> PipelineResult<EphemeralDatabase> {
        let database = self
            .start(name, instance_dir, port)
            .await
            .map_err(|e| PipelineError::provisioning(name, e))?;
        info!("Started {} container on port {}", name, database.port());
        Ok(database)
    }
}

struct ContainerServer {
    id: String,
}

impl ServerProcess for ContainerServer {
    fn stop(&mut self) -> Result<()> {
        let id = self.id.clone();
        // A fresh runtime on its own thread works from both async and sync
        // callers, including `Drop` during runtime shutdown
        std::thread::spawn(move || -> Result<()> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(async {
                let client = DockerClient::connect().await?;
                client.remove(&id).await
            })
        })
        .join()
        .map_err(|_| anyhow!("container cleanup thread panicked"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_round_trip() {
        let before = registered_container_count();
        register_container("test-container-a");
        assert_eq!(registered_container_count(), before + 1);
        unregister_container("test-container-a");
        assert_eq!(registered_container_count(), before);
    }

    #[test]
    fn test_is_not_found() {
        assert!(is_not_found("Docker responded with status code 404: No such container: abc"));
        assert!(!is_not_found("Docker responded with status code 500: boom"));
    }

    #[test]
    fn test_provisioner_uses_resolved_image() {
        let ephemeral = Ephemeral {
            docker_version: "15".to_string(),
            ..Default::default()
        };
        assert_eq!(DockerProvisioner::new(&ephemeral).image, "postgres:15-alpine");
    }
}
