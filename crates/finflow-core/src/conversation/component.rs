use serde_json::json;

use super::{ConversationResponse, PhaseController};
use crate::defaults::names;
use crate::error::Result;
use crate::pipeline::{vars, Turn};
use crate::project::ProjectSnapshot;
use crate::types::{status, ComponentStatus, Intent, Phase};

/// One line per component: `name [status] description (depends on: ...)`.
fn components_summary(project: &ProjectSnapshot) -> String {
    project
        .components
        .iter()
        .map(|c| {
            let mut line = format!("- {} [{}]", c.name, c.status);
            if let Some(d) = &c.description {
                line.push_str(&format!(" {d}"));
            }
            if !c.dependencies.is_empty() {
                line.push_str(&format!(" (depends on: {})", c.dependencies.join(", ")));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl PhaseController {
    pub(super) async fn handle_component(
        &self,
        project: ProjectSnapshot,
        message: &str,
        turn: Turn<'_>,
    ) -> Result<ConversationResponse> {
        let intent = self.classify(message, turn).await?;
        self.component_turn(project, message, intent, turn).await
    }

    /// Component-phase branching for an already classified message.
    pub(super) async fn component_turn(
        &self,
        project: ProjectSnapshot,
        message: &str,
        intent: Intent,
        turn: Turn<'_>,
    ) -> Result<ConversationResponse> {
        match intent {
            Intent::Generate => self.generate_next_component(project, turn).await,
            Intent::Query => {
                let variables = vars([
                    ("message", message.to_string()),
                    ("components", components_summary(&project)),
                ]);
                let completion = self
                    .runner
                    .run(turn, names::COMPONENT_QUERY, &variables)
                    .await?;
                Ok(ConversationResponse::reply(
                    completion.content.trim(),
                    json!({ "type": "component_query" }),
                ))
            }
            _ => {
                self.general_query(&project, message, turn, Phase::Component)
                    .await
            }
        }
    }

    async fn generate_next_component(
        &self,
        mut project: ProjectSnapshot,
        turn: Turn<'_>,
    ) -> Result<ConversationResponse> {
        let Some(index) = project.next_eligible_component() else {
            return Ok(Self::generation_complete(project));
        };
        project.components[index].set_status(ComponentStatus::InProgress);
        let component = project.components[index].clone();

        match self.components.generate(&project, &component, turn).await {
            Ok(code) => {
                let c = &mut project.components[index];
                c.code = Some(code);
                c.set_status(ComponentStatus::Completed);
                project.set_status(status::COMPONENT_GENERATION);
                let remaining = project
                    .components
                    .iter()
                    .filter(|c| c.status == ComponentStatus::Pending)
                    .count();
                tracing::info!(
                    project = %project.id,
                    component = %component.name,
                    remaining,
                    "component generated"
                );
                Ok(ConversationResponse::reply(
                    format!(
                        "I've generated the {} component. {remaining} component(s) left; say \
                         'generate' to continue.",
                        component.name
                    ),
                    json!({
                        "type": "component_generated",
                        "component": component.name,
                        "remaining": remaining,
                    }),
                )
                .with_update(project))
            }
            Err(e) if e.is_fatal_for_turn() => Err(e),
            Err(e) => {
                tracing::error!(
                    project = %project.id,
                    component = %component.name,
                    error = %e,
                    "component generation failed"
                );
                project.components[index].set_status(ComponentStatus::Failed);
                project.set_status(status::COMPONENT_GENERATION);
                Ok(ConversationResponse::reply(
                    format!(
                        "I'm sorry, I ran into a problem generating the {} component. Would you \
                         like me to try a different component? Say 'generate' to move on to the \
                         next one.",
                        component.name
                    ),
                    json!({
                        "type": "error",
                        "error": e.to_string(),
                        "stage": "component_generation",
                        "component": component.name,
                    }),
                )
                .with_update(project))
            }
        }
    }

    fn generation_complete(mut project: ProjectSnapshot) -> ConversationResponse {
        let failed: Vec<String> = project
            .components
            .iter()
            .filter(|c| c.status != ComponentStatus::Completed)
            .map(|c| c.name.clone())
            .collect();
        project.set_status(status::COMPLETED);
        tracing::info!(project = %project.id, "component generation complete");

        let mut message =
            "Component generation is complete. I'm here to help with any questions about \
             your project."
                .to_string();
        if !failed.is_empty() {
            message.push_str(&format!(
                " These components could not be generated: {}.",
                failed.join(", ")
            ));
        }
        ConversationResponse::reply(
            message,
            json!({ "type": "generation_complete", "not_generated": failed }),
        )
        .with_update(project)
        .with_next_phase(Phase::Support)
    }
}
