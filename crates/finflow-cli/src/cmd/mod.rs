pub mod chat;
pub mod config;
pub mod init;
pub mod perf;
pub mod project;
pub mod template;

use anyhow::Context;
use finflow_core::{config::Config, store::PromptDb};
use std::path::Path;

/// Load the workspace config and open its prompt database.
pub(crate) fn open_workspace(root: &Path) -> anyhow::Result<(Config, PromptDb)> {
    let config = Config::load(root).context("failed to load config")?;
    let db_path = config.database_path(root);
    let db = PromptDb::open(&db_path)
        .with_context(|| format!("failed to open prompt database {}", db_path.display()))?;
    Ok((config, db))
}
