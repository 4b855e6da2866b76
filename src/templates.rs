//! Files regenerated with the new migration version after each generated
//! migration, e.g. a schema version constant compiled into an application.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::debug;

use crate::config::TemplateSpec;
use crate::error::{PipelineError, PipelineResult};

static VERSION_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*version\s*\}\}").expect("valid placeholder pattern"));

pub fn render_template(content: &str, version: u32) -> String {
    VERSION_PLACEHOLDER
        .replace_all(content, version.to_string().as_str())
        .into_owned()
}

/// Write every template under `root_dir`, creating parent directories
pub fn write_templates(root_dir: &Path, templates: &[TemplateSpec], version: u32) -> PipelineResult<()> {
    for template in templates {
        let path = root_dir.join(&template.path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PipelineError::io_at("create", parent, e))?;
        }
        std::fs::write(&path, render_template(&template.content, version))
            .map_err(|e| PipelineError::io_at("write", &path, e))?;
        debug!("Wrote template {}", path.display());
    }
    Ok(())
}
