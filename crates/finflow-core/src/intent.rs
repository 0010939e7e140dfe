use std::sync::Arc;

use crate::defaults::names;
use crate::error::{FinflowError, Result};
use crate::pipeline::{vars, PromptRunner, Turn};
use crate::types::Intent;

/// Labels a chat message with an [`Intent`] via the `determine_intent`
/// template.
#[derive(Clone)]
pub struct IntentClassifier {
    runner: Arc<PromptRunner>,
}

impl IntentClassifier {
    pub fn new(runner: Arc<PromptRunner>) -> Self {
        Self { runner }
    }

    /// Classify `message`. A failed completion or a missing template yields
    /// `Intent::Query`; rendering errors are returned.
    pub async fn classify(&self, message: &str, turn: Turn<'_>) -> Result<Intent> {
        let variables = vars([("message", message.to_string())]);
        match self
            .runner
            .run(turn, names::DETERMINE_INTENT, &variables)
            .await
        {
            Ok(completion) => {
                let intent = Intent::from_label(&completion.content);
                tracing::debug!(project = turn.project_id, %intent, "classified message");
                Ok(intent)
            }
            Err(e @ (FinflowError::Completion(_) | FinflowError::TemplateNotFound(_))) => {
                tracing::warn!(
                    project = turn.project_id,
                    error = %e,
                    "intent classification failed, defaulting to query"
                );
                Ok(Intent::Query)
            }
            Err(e) => Err(e),
        }
    }
}
