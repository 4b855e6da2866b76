//! `--dev` mode: poll the model and regenerate whenever it changes.

use tracing::{debug, error};

use super::{OutputMode, Orchestrator, RunOutcome, ShutdownSignal};
use crate::change::Fingerprint;
use crate::constants::WATCH_POLL_INTERVAL;
use crate::ephemeral::Provisioner;
use crate::export::ModelExporter;

/// What one poll did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    Unchanged,
    /// Content already failed once; it is retried after the next edit
    KnownFailure,
    Generated(RunOutcome),
    Failed(String),
}

/// Poll state. `baseline` only advances on success; `failed` remembers the
/// content of the last failed attempt so it is not retried every poll.
pub struct WatchLoop<'a, P, E> {
    orchestrator: &'a Orchestrator<P, E>,
    mode: OutputMode,
    baseline: Fingerprint,
    failed: Option<Fingerprint>,
}

impl<'a, P: Provisioner, E: ModelExporter> WatchLoop<'a, P, E> {
    pub fn new(orchestrator: &'a Orchestrator<P, E>, mode: OutputMode) -> Self {
        Self {
            orchestrator,
            mode,
            baseline: Fingerprint::new(),
            failed: None,
        }
    }

    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    pub async fn tick(&mut self) -> Tick {
        let fingerprint = match self.orchestrator.check(&self.baseline) {
            Ok((false, _)) => return Tick::Unchanged,
            Ok((true, fingerprint)) => fingerprint,
            Err(e) => {
                error!("Failed to run: {}", e);
                return Tick::Failed(e.to_string());
            }
        };
        if self.failed.as_ref() == Some(&fingerprint) {
            return Tick::KnownFailure;
        }

        match self.orchestrator.generate(&self.mode, fingerprint.clone()).await {
            Ok(outcome) => {
                self.baseline = fingerprint;
                self.failed = None;
                Tick::Generated(outcome)
            }
            Err(e) => {
                error!("Failed to run: {}", e);
                self.failed = Some(fingerprint);
                Tick::Failed(e.to_string())
            }
        }
    }

    /// Poll until `shutdown` is raised. Each iteration, cleanup included,
    /// finishes before the flag is looked at.
    pub async fn run(&mut self, shutdown: &ShutdownSignal) {
        println!(
            "Watching {} for changes, press Ctrl+C to stop",
            self.orchestrator.model_path().display()
        );
        loop {
            let tick = self.tick().await;
            debug!("Watch tick: {:?}", tick);
            if shutdown.is_shutdown() {
                break;
            }
            tokio::time::sleep(WATCH_POLL_INTERVAL).await;
            if shutdown.is_shutdown() {
                break;
            }
        }
        println!("Watch mode stopped");
    }
}
