//! Phase-driven conversation controller.
//!
//! Each turn reloads the project, derives its [`Phase`] from the stored status
//! and hands the message to that phase's handler:
//!
//! ```text
//! status ──► Phase::from_status ──► requirements │ blueprint │ component │ support
//!                                        │
//!                     classify intent ───┘──► branch ──► ConversationResponse
//! ```
//!
//! The controller never saves. When a response has `update_project` set, the
//! caller persists `project_data`.

mod blueprint;
mod component;
mod requirements;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::defaults::names;
use crate::error::{FinflowError, Result};
use crate::extract::RequirementsExtractor;
use crate::generator::{
    BlueprintGenerator, ComponentGenerator, PromptedBlueprintGenerator, PromptedComponentGenerator,
};
use crate::intent::IntentClassifier;
use crate::pipeline::{vars, PromptRunner, Turn};
use crate::project::{ProjectRepository, ProjectSnapshot};
use crate::types::{Intent, Phase};

// ---------------------------------------------------------------------------
// ConversationResponse
// ---------------------------------------------------------------------------

/// The reply to one message, plus any project mutation to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub message: String,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub update_project: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_data: Option<ProjectSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_phase: Option<Phase>,
}

impl ConversationResponse {
    pub fn reply(message: impl Into<String>, metadata: Value) -> Self {
        Self {
            message: message.into(),
            metadata,
            update_project: false,
            project_data: None,
            next_phase: None,
        }
    }

    /// Mark `project` as changed and carry it back to the caller.
    pub fn with_update(mut self, project: ProjectSnapshot) -> Self {
        self.update_project = true;
        self.project_data = Some(project);
        self
    }

    pub fn with_next_phase(mut self, phase: Phase) -> Self {
        self.next_phase = Some(phase);
        self
    }

    /// The apology returned when a turn fails in an unexpected way.
    pub fn fault(error: &FinflowError) -> Self {
        Self::reply(
            "I'm sorry, something went wrong while processing your message. Please try again.",
            json!({ "type": "error", "error": error.to_string() }),
        )
    }
}

// ---------------------------------------------------------------------------
// PhaseController
// ---------------------------------------------------------------------------

/// Routes each message to the handler of the project's current phase.
pub struct PhaseController {
    projects: Arc<dyn ProjectRepository>,
    runner: Arc<PromptRunner>,
    classifier: IntentClassifier,
    extractor: RequirementsExtractor,
    blueprints: Arc<dyn BlueprintGenerator>,
    components: Arc<dyn ComponentGenerator>,
}

impl PhaseController {
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        runner: Arc<PromptRunner>,
        blueprints: Arc<dyn BlueprintGenerator>,
        components: Arc<dyn ComponentGenerator>,
    ) -> Self {
        Self {
            projects,
            classifier: IntentClassifier::new(runner.clone()),
            extractor: RequirementsExtractor::new(runner.clone()),
            runner,
            blueprints,
            components,
        }
    }

    /// A controller whose generators are driven by the stored templates.
    pub fn with_prompted_generators(
        projects: Arc<dyn ProjectRepository>,
        runner: Arc<PromptRunner>,
    ) -> Self {
        let blueprints = Arc::new(PromptedBlueprintGenerator::new(runner.clone()));
        let components = Arc::new(PromptedComponentGenerator::new(runner.clone()));
        Self::new(projects, runner, blueprints, components)
    }

    /// Process one chat message for `project_id`.
    ///
    /// Returns `Err` only for a missing project, a failure loading it, or a
    /// template rendered without its required variables. Every other failure
    /// becomes an apology carrying `{"type": "error"}` metadata.
    pub async fn process_message(
        &self,
        project_id: &str,
        message: &str,
        user_id: &str,
    ) -> Result<ConversationResponse> {
        let project = self
            .projects
            .load(project_id)
            .await?
            .ok_or_else(|| FinflowError::ProjectNotFound(project_id.to_string()))?;

        let phase = project.phase();
        let turn = Turn::for_project(project_id);
        tracing::info!(project = project_id, user = user_id, %phase, "processing message");

        let result = match phase {
            Phase::Requirements => self.handle_requirements(project, message, turn).await,
            Phase::Blueprint => self.handle_blueprint(project, message, turn).await,
            Phase::Component => self.handle_component(project, message, turn).await,
            Phase::Support => self.general_query(&project, message, turn, phase).await,
        };

        match result {
            Ok(response) => Ok(response),
            Err(e) if e.is_fatal_for_turn() => Err(e),
            Err(e) => {
                tracing::error!(project = project_id, %phase, error = %e, "message processing failed");
                Ok(ConversationResponse::fault(&e))
            }
        }
    }

    async fn classify(&self, message: &str, turn: Turn<'_>) -> Result<Intent> {
        self.classifier.classify(message, turn).await
    }

    /// Answer with the `general_query` template; never mutates the project.
    async fn general_query(
        &self,
        project: &ProjectSnapshot,
        message: &str,
        turn: Turn<'_>,
        phase: Phase,
    ) -> Result<ConversationResponse> {
        let variables = vars([
            ("message", message.to_string()),
            ("project_context", project.context()),
        ]);
        let completion = self
            .runner
            .run(turn, names::GENERAL_QUERY, &variables)
            .await?;
        Ok(ConversationResponse::reply(
            completion.content.trim(),
            json!({ "type": "general_query", "phase": phase }),
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
