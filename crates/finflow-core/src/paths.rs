use crate::error::{FinflowError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const FINFLOW_DIR: &str = ".finflow";
pub const PROJECTS_DIR: &str = ".finflow/projects";

pub const CONFIG_FILE: &str = ".finflow/config.yaml";
pub const DEFAULT_DATABASE: &str = ".finflow/prompts.db";

pub const PROJECT_FILE: &str = "project.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn project_dir(root: &Path, id: &str) -> PathBuf {
    root.join(PROJECTS_DIR).join(id)
}

pub fn project_file(root: &Path, id: &str) -> PathBuf {
    project_dir(root, id).join(PROJECT_FILE)
}

/// Resolve a configured path: absolute paths are used as-is, relative paths
/// are taken from the workspace root.
pub fn resolve(root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        root.join(configured)
    }
}

// ---------------------------------------------------------------------------
// Identifier validation
// ---------------------------------------------------------------------------

static PROJECT_ID_RE: OnceLock<Regex> = OnceLock::new();
static TEMPLATE_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn project_id_re() -> &'static Regex {
    PROJECT_ID_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

fn template_name_re() -> &'static Regex {
    TEMPLATE_NAME_RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]*$").unwrap())
}

pub fn validate_project_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 64 || !project_id_re().is_match(id) {
        return Err(FinflowError::InvalidProjectId(id.to_string()));
    }
    Ok(())
}

pub fn validate_template_name(name: &str) -> Result<()> {
    if name.len() > 128 || !template_name_re().is_match(name) {
        return Err(FinflowError::InvalidTemplateName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
