//! Disposable PostgreSQL servers.
//!
//! A run provisions two of these ("replay" and "desired"), each with its own
//! instance directory and port, and releases both before it returns. Release
//! is explicit and idempotent; `Drop` is only a backstop for panics and
//! cancelled futures.

pub mod docker;
pub mod local;

use anyhow::{Context, Result};
use sqlx::PgPool;
use std::future::Future;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::{Backend, Config};
use crate::db::{self, ConnectionConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::render::quote_ident;

pub use docker::DockerProvisioner;
pub use local::LocalProvisioner;

/// Handle on a running server that knows how to shut it down.
///
/// `stop` is blocking so it can be called from `Drop`.
pub trait ServerProcess: Send {
    fn stop(&mut self) -> Result<()>;
}

pub struct EphemeralDatabase {
    name: String,
    instance_dir: PathBuf,
    port: u16,
    dsn: String,
    process: Option<Box<dyn ServerProcess>>,
}

impl EphemeralDatabase {
    pub fn new(
        name: impl Into<String>,
        instance_dir: impl Into<PathBuf>,
        port: u16,
        dsn: impl Into<String>,
        process: Box<dyn ServerProcess>,
    ) -> Self {
        Self {
            name: name.into(),
            instance_dir: instance_dir.into(),
            port,
            dsn: dsn.into(),
            process: Some(process),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance_dir(&self) -> &Path {
        &self.instance_dir
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    pub fn is_released(&self) -> bool {
        self.process.is_none()
    }

    /// Stop the server. Calling it again is a no-op.
    pub async fn release(&mut self) -> Result<()> {
        let Some(mut process) = self.process.take() else {
            return Ok(());
        };

        debug!("Releasing {} database on port {}", self.name, self.port);
        tokio::task::spawn_blocking(move || process.stop())
            .await
            .context("server shutdown task panicked")?
            .with_context(|| format!("failed to stop {} database", self.name))
    }
}

impl Drop for EphemeralDatabase {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            debug!("Stopping {} database from drop", self.name);
            if let Err(e) = process.stop() {
                warn!("Failed to stop {} database: {:#}", self.name, e);
            }
        }
    }
}

impl std::fmt::Debug for EphemeralDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralDatabase")
            .field("name", &self.name)
            .field("instance_dir", &self.instance_dir)
            .field("port", &self.port)
            .field("dsn", &db::mask_url_password(&self.dsn))
            .field("released", &self.is_released())
            .finish()
    }
}

pub trait Provisioner {
    /// Start a server named `name` rooted at `instance_dir`, listening on
    /// `port` or on a free port when `None`.
    fn provision(
        &self,
        name: &str,
        instance_dir: &Path,
        port: Option<u16>,
    ) -> impl Future<Output = PipelineResult<EphemeralDatabase>> + Send;
}

/// Provisioner selected by `ephemeral.backend`
pub enum ConfiguredProvisioner {
    Local(LocalProvisioner),
    Docker(DockerProvisioner),
}

impl ConfiguredProvisioner {
    pub fn from_config(config: &Config) -> Self {
        match config.ephemeral.backend {
            Backend::Local => Self::Local(LocalProvisioner::new(&config.ephemeral)),
            Backend::Docker => Self::Docker(DockerProvisioner::new(&config.ephemeral)),
        }
    }
}

impl Provisioner for ConfiguredProvisioner {
    async fn provision(
        &self,
        name: &str,
        instance_dir: &Path,
        port: Option<u16>,
    ) -> PipelineResult<EphemeralDatabase> {
        match self {
            Self::Local(local) => local.provision(name, instance_dir, port).await,
            Self::Docker(docker) => docker.provision(name, instance_dir, port).await,
        }
    }
}

/// Ask the kernel for a port nobody is listening on
pub fn free_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

/// Wait until the server at `dsn` accepts connections and answers `SELECT 1`
pub async fn wait_until_ready(dsn: &str, connection: &ConnectionConfig) -> Result<()> {
    let pool = db::connect_with_retry(dsn, connection).await?;
    let probe = db::ping(&pool).await;
    pool.close().await;
    probe.context("server accepted the connection but did not answer a query")
}

/// Create each configured user as a LOGIN role, skipping ones that exist
pub async fn create_users(
    database: &EphemeralDatabase,
    users: &[String],
    connection: &ConnectionConfig,
) -> PipelineResult<()> {
    if users.is_empty() {
        return Ok(());
    }

    let pool = db::connect_with_retry(database.dsn(), connection)
        .await
        .map_err(|e| PipelineError::provisioning(database.name(), e))?;
    let result = create_roles(&pool, users).await;
    pool.close().await;

    result.map_err(|e| PipelineError::provisioning(database.name(), e))
}

async fn create_roles(pool: &PgPool, users: &[String]) -> Result<()> {
    for user in users {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_roles WHERE rolname = $1)")
                .bind(user)
                .fetch_one(pool)
                .await?;
        if exists {
            debug!("Role {} already exists", user);
            continue;
        }

        sqlx::query(&format!("CREATE ROLE {} WITH LOGIN", quote_ident(user)))
            .execute(pool)
            .await
            .with_context(|| format!("failed to create role {}", user))?;
        debug!("Created role {}", user);
    }
    Ok(())
}
