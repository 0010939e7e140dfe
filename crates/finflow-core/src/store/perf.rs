use redb::ReadableTable;
use serde::{Deserialize, Serialize};

use super::{decode, encode, perf_key, PromptDb, PERFORMANCE};
use crate::error::{store_err, Result};
use crate::recorder::{PerformanceRecord, PerformanceSink};

/// Criteria for reading back performance records. Unset fields match all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceFilter {
    pub template_name: Option<String>,
    pub conversation_id: Option<String>,
    pub success: Option<bool>,
    pub limit: Option<usize>,
}

impl PerformanceFilter {
    fn matches(&self, record: &PerformanceRecord) -> bool {
        self.template_name
            .as_deref()
            .is_none_or(|n| record.template_name == n)
            && self
                .conversation_id
                .as_deref()
                .is_none_or(|c| record.conversation_id == c)
            && self.success.is_none_or(|s| record.success == s)
    }
}

impl PerformanceSink for PromptDb {
    fn append(&self, record: &PerformanceRecord) -> Result<()> {
        let key = perf_key(record.created_at, record.id);
        let value = encode(record)?;
        let wt = self.db.begin_write().map_err(store_err)?;
        {
            let mut table = wt.open_table(PERFORMANCE).map_err(store_err)?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(store_err)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(())
    }
}

impl PromptDb {
    /// Performance records matching `filter`, newest first.
    pub fn list_performance(&self, filter: &PerformanceFilter) -> Result<Vec<PerformanceRecord>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(PERFORMANCE).map_err(store_err)?;
        let limit = filter.limit.unwrap_or(usize::MAX);

        let mut result = Vec::new();
        for entry in table.iter().map_err(store_err)?.rev() {
            if result.len() >= limit {
                break;
            }
            let (_, v) = entry.map_err(store_err)?;
            let record: PerformanceRecord = decode(v.value())?;
            if filter.matches(&record) {
                result.push(record);
            }
        }
        Ok(result)
    }
}
