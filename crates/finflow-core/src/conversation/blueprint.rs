use serde_json::json;

use super::{ConversationResponse, PhaseController};
use crate::defaults::names;
use crate::error::Result;
use crate::pipeline::{vars, Turn};
use crate::project::ProjectSnapshot;
use crate::types::{status, Intent, Phase};

const AFFIRMATIVES: &[&str] = &[
    "approve",
    "approved",
    "looks good",
    "look good",
    "lgtm",
    "sounds good",
    "go ahead",
    "yes",
    "ok",
    "okay",
    "perfect",
];

/// Whether the message reads as an approval.
///
/// Only consulted when the classifier came back with `query`, so an explicit
/// `modify` or `reject` is never overridden by a stray "ok".
fn is_affirmative(message: &str) -> bool {
    let text = message.to_lowercase();
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let normalized = words.join(" ");
    AFFIRMATIVES.iter().any(|phrase| {
        if phrase.contains(' ') {
            normalized.contains(phrase)
        } else {
            words.contains(phrase)
        }
    })
}

impl PhaseController {
    pub(super) async fn handle_blueprint(
        &self,
        project: ProjectSnapshot,
        message: &str,
        turn: Turn<'_>,
    ) -> Result<ConversationResponse> {
        let intent = self.classify(message, turn).await?;
        let approved = project.status.as_deref() == Some(status::BLUEPRINT_APPROVED);

        match intent {
            Intent::Generate if project.blueprint.is_none() => {
                self.generate_blueprint(project, turn).await
            }
            Intent::Generate if approved => {
                // An approved blueprint moves on to building its components.
                self.component_turn(project, message, Intent::Generate, turn)
                    .await
            }
            Intent::Generate => Ok(ConversationResponse::reply(
                "There is already a blueprint for this project. Approve it when you're happy \
                 with it, or tell me what you'd like to change.",
                json!({ "type": "blueprint_exists", "intent": intent }),
            )),
            _ if project.blueprint.is_some()
                && (intent == Intent::Approve
                    || (intent == Intent::Query && is_affirmative(message))) =>
            {
                Ok(self.approve_blueprint(project, intent))
            }
            Intent::Modify if project.blueprint.is_some() => {
                self.blueprint_prompt(&project, message, turn, names::BLUEPRINT_MODIFICATION)
                    .await
            }
            Intent::Query if project.blueprint.is_some() => {
                self.blueprint_prompt(&project, message, turn, names::BLUEPRINT_QUERY)
                    .await
            }
            _ => {
                self.general_query(&project, message, turn, Phase::Blueprint)
                    .await
            }
        }
    }

    async fn generate_blueprint(
        &self,
        mut project: ProjectSnapshot,
        turn: Turn<'_>,
    ) -> Result<ConversationResponse> {
        let generated = match self.blueprints.generate(&project, turn).await {
            Ok(g) => g,
            Err(e) if e.is_fatal_for_turn() => return Err(e),
            Err(e) => {
                tracing::error!(project = %project.id, error = %e, "blueprint generation failed");
                return Ok(ConversationResponse::reply(
                    "I'm sorry, I couldn't generate the blueprint just now. Please ask me to \
                     try again in a moment.",
                    json!({ "type": "error", "error": e.to_string(), "stage": "blueprint_generation" }),
                ));
            }
        };

        let component_names: Vec<String> =
            generated.components.iter().map(|c| c.name.clone()).collect();
        project.blueprint = Some(generated.blueprint);
        project.components = generated.components;
        project.set_status(status::BLUEPRINT_GENERATED);
        tracing::info!(
            project = %project.id,
            components = component_names.len(),
            "blueprint generated"
        );

        let message = format!(
            "I've drafted an architecture blueprint with {} components: {}. Review it and \
             approve it when you're happy, or tell me what you'd like to change.",
            component_names.len(),
            component_names.join(", ")
        );
        Ok(ConversationResponse::reply(
            message,
            json!({ "type": "blueprint_generated", "components": component_names }),
        )
        .with_update(project))
    }

    fn approve_blueprint(&self, mut project: ProjectSnapshot, intent: Intent) -> ConversationResponse {
        project.set_status(status::BLUEPRINT_APPROVED);
        tracing::info!(project = %project.id, "blueprint approved");
        ConversationResponse::reply(
            "Blueprint approved. Next we'll build the components one at a time. Say \
             'generate' when you want me to start.",
            json!({ "type": "blueprint_approved", "intent": intent }),
        )
        .with_update(project)
        .with_next_phase(Phase::Component)
    }

    /// Run a template that takes the message and the current blueprint.
    /// The blueprint itself is left untouched.
    async fn blueprint_prompt(
        &self,
        project: &ProjectSnapshot,
        message: &str,
        turn: Turn<'_>,
        template: &str,
    ) -> Result<ConversationResponse> {
        let blueprint = project
            .blueprint
            .as_ref()
            .map(|b| serde_json::to_string_pretty(b))
            .transpose()?
            .unwrap_or_default();
        let variables = vars([("message", message.to_string()), ("blueprint", blueprint)]);
        let completion = self.runner.run(turn, template, &variables).await?;
        let kind = if template == names::BLUEPRINT_MODIFICATION {
            "blueprint_modification_suggestion"
        } else {
            "blueprint_query"
        };
        Ok(ConversationResponse::reply(
            completion.content.trim(),
            json!({ "type": kind }),
        ))
    }
}
