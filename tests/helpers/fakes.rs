//! Stand-ins for the external processes a run drives.

use anyhow::Result;
use modelmig::ephemeral::{EphemeralDatabase, Provisioner, ServerProcess};
use modelmig::export::ModelExporter;
use modelmig::PipelineResult;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Nothing listens on port 1, so anything that connects fails fast
pub const UNREACHABLE_DSN: &str = "postgres://postgres@127.0.0.1:1/postgres";

struct CountingServer(Arc<AtomicUsize>);

impl ServerProcess for CountingServer {
    fn stop(&mut self) -> Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out databases that cannot be reached and counts how they are used.
/// Clones share their counters.
#[derive(Clone, Default)]
pub struct FakeProvisioner {
    pub provisioned: Arc<AtomicUsize>,
    pub stopped: Arc<AtomicUsize>,
    pub instance_dirs: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeProvisioner {
    pub fn provisioned(&self) -> usize {
        self.provisioned.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn instance_dirs(&self) -> Vec<PathBuf> {
        self.instance_dirs.lock().unwrap().clone()
    }
}

impl Provisioner for FakeProvisioner {
    async fn provision(
        &self,
        name: &str,
        instance_dir: &Path,
        _port: Option<u16>,
    ) -> PipelineResult<EphemeralDatabase> {
        std::fs::create_dir_all(instance_dir).unwrap();
        self.provisioned.fetch_add(1, Ordering::SeqCst);
        self.instance_dirs
            .lock()
            .unwrap()
            .push(instance_dir.to_path_buf());
        Ok(EphemeralDatabase::new(
            name,
            instance_dir,
            1,
            UNREACHABLE_DSN,
            Box::new(CountingServer(self.stopped.clone())),
        ))
    }
}

/// Treats the model file as SQL and copies it next to itself
#[derive(Clone, Default)]
pub struct CopyExporter {
    pub exports: Arc<AtomicUsize>,
}

impl CopyExporter {
    pub fn exports(&self) -> usize {
        self.exports.load(Ordering::SeqCst)
    }
}

impl ModelExporter for CopyExporter {
    async fn export_sql(&self, model: &Path) -> Result<PathBuf> {
        self.exports.fetch_add(1, Ordering::SeqCst);
        let output = model.with_extension("sql");
        std::fs::copy(model, &output)?;
        Ok(output)
    }

    async fn export_image(&self, model: &Path) -> Result<PathBuf> {
        Ok(model.with_extension("png"))
    }
}

/// Delegates to a real provisioner and remembers where each server lived
pub struct RecordingProvisioner<P> {
    inner: Arc<P>,
    started: Arc<Mutex<Vec<(PathBuf, u16)>>>,
}

impl<P> Clone for RecordingProvisioner<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            started: Arc::clone(&self.started),
        }
    }
}

impl<P> RecordingProvisioner<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner: Arc::new(inner),
            started: Arc::default(),
        }
    }

    /// Instance directory and port of every server started so far
    pub fn started(&self) -> Vec<(PathBuf, u16)> {
        self.started.lock().unwrap().clone()
    }
}

impl<P: Provisioner + Send + Sync> Provisioner for RecordingProvisioner<P> {
    async fn provision(
        &self,
        name: &str,
        instance_dir: &Path,
        port: Option<u16>,
    ) -> PipelineResult<EphemeralDatabase> {
        let database = self.inner.provision(name, instance_dir, port).await?;
        self.started
            .lock()
            .unwrap()
            .push((instance_dir.to_path_buf(), database.port()));
        Ok(database)
    }
}
