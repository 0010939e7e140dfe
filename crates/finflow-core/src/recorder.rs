use std::sync::Arc;

use chrono::{DateTime, Utc};
use finflow_completion::TokenUsage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::template::PromptTemplate;

// ---------------------------------------------------------------------------
// PerformanceRecord
// ---------------------------------------------------------------------------

/// Telemetry for one template-driven completion call. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub id: Uuid,
    /// Weak reference to the template version used; `None` when the template
    /// could not be resolved.
    #[serde(default)]
    pub template_id: Option<Uuid>,
    pub template_name: String,
    pub conversation_id: String,
    pub token_usage: TokenUsage,
    pub latency_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Which template an invocation used.
#[derive(Debug, Clone, Copy)]
pub struct TemplateRef<'a> {
    pub id: Option<Uuid>,
    pub name: &'a str,
}

impl<'a> From<&'a PromptTemplate> for TemplateRef<'a> {
    fn from(t: &'a PromptTemplate) -> Self {
        Self {
            id: Some(t.id),
            name: &t.name,
        }
    }
}

// ---------------------------------------------------------------------------
// PerformanceSink
// ---------------------------------------------------------------------------

/// Append-only destination for performance records.
pub trait PerformanceSink: Send + Sync {
    fn append(&self, record: &PerformanceRecord) -> Result<()>;
}

// ---------------------------------------------------------------------------
// PerformanceRecorder
// ---------------------------------------------------------------------------

/// Builds performance records and hands them to a sink.
///
/// `record` never fails: a sink error is logged and dropped so that lost
/// telemetry cannot fail a conversation turn.
#[derive(Clone)]
pub struct PerformanceRecorder {
    sink: Arc<dyn PerformanceSink>,
}

impl PerformanceRecorder {
    pub fn new(sink: Arc<dyn PerformanceSink>) -> Self {
        Self { sink }
    }

    pub fn record(
        &self,
        template: TemplateRef<'_>,
        conversation_id: &str,
        usage: TokenUsage,
        latency_ms: u64,
        success: bool,
        error_details: Option<String>,
    ) {
        let record = PerformanceRecord {
            id: Uuid::new_v4(),
            template_id: template.id,
            template_name: template.name.to_string(),
            conversation_id: conversation_id.to_string(),
            token_usage: usage,
            latency_ms,
            success,
            error_details,
            created_at: Utc::now(),
        };
        if let Err(e) = self.sink.append(&record) {
            tracing::warn!(
                template = %record.template_name,
                conversation = %record.conversation_id,
                error = %e,
                "failed to record template performance"
            );
        }
    }
}
