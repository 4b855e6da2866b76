pub mod builder;
pub mod defaults;
pub mod merge;
pub mod types;


pub use builder::ConfigBuilder;
pub use types::*;

use crate::error::{PipelineError, PipelineResult};
use std::path::{Path, PathBuf};

/// Load the YAML config file; its directory becomes the project root.
/// A missing file yields empty input so CLI flags alone can drive a run.
pub fn load_config(config_file: &str) -> PipelineResult<(ConfigInput, PathBuf)> {
    let config_path = Path::new(config_file);
    let config_dir = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let config_input = if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| PipelineError::io_at("read", config_path, e))?;
        serde_yaml::from_str(&contents).map_err(|e| {
            PipelineError::Config(format!("{} is not valid: {}", config_path.display(), e))
        })?
    } else {
        ConfigInput::default()
    };

    Ok((config_input, config_dir))
}
