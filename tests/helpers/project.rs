use modelmig::config::{Config, ConfigBuilder, ConfigInput, EphemeralInput};
use modelmig::migration::{NewMigration, discover_migrations, resolve_new_migration};
use modelmig::pipeline::OutputMode;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

pub const MODEL_NAME: &str = "app";

/// A throwaway project directory holding a model and a migrations folder
pub struct TestProject {
    pub temp_dir: TempDir,
    pub root: PathBuf,
}

impl TestProject {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().to_path_buf();
        fs::create_dir_all(root.join("migrations")).unwrap();
        Self { temp_dir, root }
    }

    pub fn write_model(&self, content: &str) {
        fs::write(self.root.join(format!("{}.dbm", MODEL_NAME)), content).unwrap();
    }

    pub fn write_migration(&self, filename: &str, content: &str) {
        fs::write(self.root.join("migrations").join(filename), content).unwrap();
    }

    pub fn write_config(&self, yaml: &str) {
        fs::write(self.root.join("modelmig.yaml"), yaml).unwrap();
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.root.join("migrations")
    }

    pub fn config(&self, users: &[&str], ephemeral: EphemeralInput) -> Config {
        ConfigBuilder::new()
            .with_file(ConfigInput {
                model_name: Some(MODEL_NAME.to_string()),
                database_users: Some(users.iter().map(|u| u.to_string()).collect()),
                ephemeral: Some(ephemeral),
                ..Default::default()
            })
            .resolve()
            .unwrap()
    }

    /// File output for the next migration called `name`
    pub fn file_mode(&self, name: &str) -> OutputMode {
        OutputMode::File(self.next_migration(name))
    }

    pub fn next_migration(&self, name: &str) -> NewMigration {
        let existing = discover_migrations(&self.migrations_dir()).unwrap();
        resolve_new_migration(&self.migrations_dir(), &existing, name, false).unwrap()
    }
}

/// Input that makes a connection attempt give up immediately
pub fn fail_fast() -> EphemeralInput {
    EphemeralInput {
        connect_retries: Some(0),
        retry_delay_ms: Some(1),
        ..Default::default()
    }
}

fn runs_as_root() -> bool {
    Command::new("id")
        .arg("-u")
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).trim() == "0")
        .unwrap_or(false)
}

/// Directory with `initdb`, `pg_ctl` and `pg_dump`, or `None` when tests
/// that need real servers should be skipped. `MODELMIG_PG_BIN_DIR` wins over
/// `PATH`; initdb refuses to run as root.
pub fn pg_bin_dir() -> Option<Option<PathBuf>> {
    if runs_as_root() {
        return None;
    }
    let bin_dir = std::env::var_os("MODELMIG_PG_BIN_DIR").map(PathBuf::from);
    let binary = |name: &str| match &bin_dir {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    };

    let available = ["initdb", "pg_ctl", "pg_dump"].iter().all(|name| {
        Command::new(binary(name))
            .arg("--version")
            .output()
            .is_ok_and(|out| out.status.success())
    });
    available.then_some(bin_dir)
}

pub fn local_ephemeral(bin_dir: Option<PathBuf>) -> EphemeralInput {
    EphemeralInput {
        bin_dir: bin_dir.map(|dir| dir.display().to_string()),
        ..Default::default()
    }
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}
