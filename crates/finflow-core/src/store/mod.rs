//! Prompt template store and telemetry log, backed by redb.
//!
//! # Table design
//!
//! ```text
//! templates          (name, version)              -> JSON PromptTemplate
//! project_templates  (project_id, name, version)  -> JSON ProjectPromptOverride
//! performance        [ ts_ms BE (8) | uuid (16) ] -> JSON PerformanceRecord
//! ```
//!
//! Tuple keys sort by name and then version, so every version of a name is one
//! contiguous range and the highest version is the last entry of that range.
//! Version assignment reads that range and inserts inside the same write
//! transaction, so concurrent creates cannot hand out the same version.
//!
//! The performance key puts a big-endian timestamp in the high bytes: byte
//! order is chronological order.

mod perf;
mod templates;

pub use perf::PerformanceFilter;

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{store_err, Result};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

const TEMPLATES: TableDefinition<(&str, u32), &[u8]> = TableDefinition::new("templates");

const PROJECT_TEMPLATES: TableDefinition<(&str, &str, u32), &[u8]> =
    TableDefinition::new("project_templates");

const PERFORMANCE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("performance");

// ---------------------------------------------------------------------------
// Key / value helpers
// ---------------------------------------------------------------------------

fn perf_key(ts: DateTime<Utc>, id: Uuid) -> [u8; 24] {
    let mut key = [0u8; 24];
    let ms = ts.timestamp_millis().max(0) as u64;
    key[..8].copy_from_slice(&ms.to_be_bytes());
    key[8..].copy_from_slice(id.as_bytes());
    key
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(store_err)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(store_err)
}

// ---------------------------------------------------------------------------
// PromptDb
// ---------------------------------------------------------------------------

/// Persistent store for templates, project overrides and performance records.
pub struct PromptDb {
    db: Database,
}

impl PromptDb {
    /// Open or create the database at `path`, creating all tables.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(store_err)?;
        let wt = db.begin_write().map_err(store_err)?;
        wt.open_table(TEMPLATES).map_err(store_err)?;
        wt.open_table(PROJECT_TEMPLATES).map_err(store_err)?;
        wt.open_table(PERFORMANCE).map_err(store_err)?;
        wt.commit().map_err(store_err)?;
        Ok(Self { db })
    }
}

#[cfg(test)]
pub(crate) fn open_tmp() -> (tempfile::TempDir, PromptDb) {
    let dir = tempfile::TempDir::new().unwrap();
    let db = PromptDb::open(&dir.path().join("prompts.db")).unwrap();
    (dir, db)
}
