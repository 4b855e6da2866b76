use std::path::Path;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};

/// Model content a run was generated from, compared on the next poll
pub type Fingerprint = String;

/// Read the model and compare it with `previous`.
///
/// Returns whether a run is needed together with the fingerprint of the
/// current content. An empty model never counts as a change.
pub fn has_changed(model_path: &Path, previous: &str) -> PipelineResult<(bool, Fingerprint)> {
    let content = std::fs::read_to_string(model_path)
        .map_err(|e| PipelineError::io_at("read model file", model_path, e))?;
    let fingerprint = content.strip_suffix('\n').unwrap_or(&content).to_string();

    if fingerprint.is_empty() || fingerprint == previous {
        return Ok((false, fingerprint));
    }

    info!("Changes detected in {}", model_path.display());
    debug!("Model digest {:x}", md5::compute(fingerprint.as_bytes()));
    Ok((true, fingerprint))
}
