//! Ephemeral servers built from the local PostgreSQL installation
//! (`initdb` + `pg_ctl`).

use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info};

use super::{EphemeralDatabase, Provisioner, ServerProcess, free_port, wait_until_ready};
use crate::config::Ephemeral;
use crate::constants::{EPHEMERAL_DATABASE, EPHEMERAL_SUPERUSER};
use crate::db::ConnectionConfig;
use crate::error::{PipelineError, PipelineResult};

const SERVER_LOG: &str = "server.log";
const DATA_DIR: &str = "data";
const START_TIMEOUT_SECS: u32 = 30;

pub struct LocalProvisioner {
    initdb: PathBuf,
    pg_ctl: PathBuf,
    connection: ConnectionConfig,
}

impl LocalProvisioner {
    pub fn new(ephemeral: &Ephemeral) -> Self {
        Self {
            initdb: ephemeral.binary("initdb"),
            pg_ctl: ephemeral.binary("pg_ctl"),
            connection: ConnectionConfig::from(ephemeral),
        }
    }

    async fn start(&self, name: &str, instance_dir: &Path, port: Option<u16>) -> Result<EphemeralDatabase> {
        let data_dir = instance_dir.join(DATA_DIR);
        let log_file = instance_dir.join(SERVER_LOG);
        std::fs::create_dir_all(instance_dir)
            .with_context(|| format!("failed to create {}", instance_dir.display()))?;

        debug!("Initializing {} cluster in {}", name, data_dir.display());
        let output = Command::new(&self.initdb)
            .arg("-D")
            .arg(&data_dir)
            .args(["-U", EPHEMERAL_SUPERUSER, "--auth=trust", "--encoding=UTF8", "--no-sync"])
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.initdb.display()))?;
        check_status("initdb", &output)?;

        let port = match port {
            Some(port) => port,
            None => free_port().context("failed to find a free port")?,
        };

        let server_options = format!(
            "-p {} -k {} -c listen_addresses=127.0.0.1 -c fsync=off",
            port,
            instance_dir.display()
        );

        let timeout = START_TIMEOUT_SECS.to_string();

        debug!("Starting {} server on port {}", name, port);
        let output = Command::new(&self.pg_ctl)
            .arg("-D")
            .arg(&data_dir)
            .arg("-l")
            .arg(&log_file)
            .args(["-w", "-t", timeout.as_str(), "-o", server_options.as_str(), "start"])
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.pg_ctl.display()))?;

        if let Err(e) = check_status("pg_ctl start", &output) {
            let log = std::fs::read_to_string(&log_file).unwrap_or_default();
            return Err(e.context(format!("server log:\n{}", tail(&log, 20))));
        }

        let dsn = format!(
            "postgres://{}@127.0.0.1:{}/{}?sslmode=disable",
            EPHEMERAL_SUPERUSER, port, EPHEMERAL_DATABASE
        );
        let server = LocalServer {
            pg_ctl: self.pg_ctl.clone(),
            data_dir,
        };
        Ok(EphemeralDatabase::new(name, instance_dir, port, dsn, Box::new(server)))
    }
}

impl Provisioner for LocalProvisioner {
    async fn provision(
        &self,
        name: &str,
        instance_dir: &Path,
        port: Option<u16>,
    ) -> PipelineResult<EphemeralDatabase> {
        let mut database = self
            .start(name, instance_dir, port)
            .await
            .map_err(|e| PipelineError::provisioning(name, e))?;

        if let Err(e) = wait_until_ready(database.dsn(), &self.connection).await {
            let _ = database.release().await;
            return Err(PipelineError::provisioning(name, e));
        }

        info!("Started {} database on port {}", name, database.port());
        Ok(database)
    }
}

struct LocalServer {
    pg_ctl: PathBuf,
    data_dir: PathBuf,
}

impl ServerProcess for LocalServer {
    fn stop(&mut self) -> Result<()> {
        let output = std::process::Command::new(&self.pg_ctl)
            .arg("-D")
            .arg(&self.data_dir)
            .args(["-m", "fast", "-w", "stop"])
            .output()
            .with_context(|| format!("failed to run {}", self.pg_ctl.display()))?;
        check_status("pg_ctl stop", &output)
    }
}

fn check_status(step: &str, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let text = if stderr.trim().is_empty() { stdout } else { stderr };
    Err(anyhow!("{} failed ({}): {}", step, output.status, text.trim()))
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binaries_follow_bin_dir() {
        let ephemeral = Ephemeral {
            bin_dir: Some(PathBuf::from("/opt/pg/bin")),
            ..Default::default()
        };
        let provisioner = LocalProvisioner::new(&ephemeral);
        assert_eq!(provisioner.initdb, PathBuf::from("/opt/pg/bin/initdb"));
        assert_eq!(provisioner.pg_ctl, PathBuf::from("/opt/pg/bin/pg_ctl"));
    }

    #[test]
    fn test_tail() {
        assert_eq!(tail("a\nb\nc\nd", 2), "c\nd");
        assert_eq!(tail("a", 5), "a");
        assert_eq!(tail("", 5), "");
    }

    #[tokio::test]
    async fn test_missing_initdb_is_a_provisioning_error() {
        let dir = tempfile::tempdir().unwrap();
        let ephemeral = Ephemeral {
            bin_dir: Some(dir.path().join("no-such-bin")),
            ..Default::default()
        };
        let provisioner = LocalProvisioner::new(&ephemeral);

        let err = provisioner
            .provision("replay", &dir.path().join("replay"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Provisioning { ref name, .. } if name == "replay"));
    }
}
