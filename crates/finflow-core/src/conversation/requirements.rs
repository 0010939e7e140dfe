use serde_json::json;

use super::{ConversationResponse, PhaseController};
use crate::error::Result;
use crate::pipeline::Turn;
use crate::project::ProjectSnapshot;
use crate::types::{status, Intent, Phase};

/// "a", "a and b", "a, b and c".
fn join_labels(labels: &[&str]) -> String {
    match labels {
        [] => String::new(),
        [one] => one.to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

/// Ask for whatever is still missing, or for everything when it is a lot.
fn missing_fields_message(missing: &[&str], captured: bool) -> String {
    let lead = if captured {
        "Thanks, I've noted that."
    } else {
        "Thanks."
    };
    if missing.len() > 2 {
        format!(
            "{lead} I need several details before we can design the architecture: the {}.",
            join_labels(missing)
        )
    } else {
        let asks: Vec<String> = missing.iter().map(|m| format!("the {m}")).collect();
        let asks: Vec<&str> = asks.iter().map(String::as_str).collect();
        format!("{lead} Could you tell me {}?", join_labels(&asks))
    }
}

impl PhaseController {
    pub(super) async fn handle_requirements(
        &self,
        mut project: ProjectSnapshot,
        message: &str,
        turn: Turn<'_>,
    ) -> Result<ConversationResponse> {
        let intent = self.classify(message, turn).await?;
        if intent == Intent::Query {
            return self
                .general_query(&project, message, turn, Phase::Requirements)
                .await;
        }

        // Every other intent, approve and reject included, is read as more
        // requirements detail.
        let extracted = self.extractor.extract(message, turn).await?;
        let changed = project.merge(&extracted);
        if project.requirements_complete() {
            project.set_status(status::REQUIREMENTS_COMPLETED);
            tracing::info!(project = %project.id, "requirements complete");
            let message = format!(
                "Great, I have everything I need for {}: {}. Next I'll design the architecture \
                 blueprint. Just say the word when you want me to generate it.",
                project.name.as_deref().unwrap_or("your project"),
                project.tech_stack.join(", ")
            );
            return Ok(ConversationResponse::reply(
                message,
                json!({
                    "type": "requirements_complete",
                    "intent": intent,
                    "extracted": extracted,
                }),
            )
            .with_update(project)
            .with_next_phase(Phase::Blueprint));
        }

        let missing = project.missing_requirements();
        let response = ConversationResponse::reply(
            missing_fields_message(&missing, changed),
            json!({
                "type": "requirements_update",
                "intent": intent,
                "missing": missing,
                "extracted": extracted,
            }),
        );
        Ok(if changed {
            response.with_update(project)
        } else {
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{complete_project, intent, script, Harness};
    use super::*;
    use crate::defaults::names;
    use crate::testutil::{tag, Reply};

    #[test]
    fn labels_are_joined_naturally() {
        assert_eq!(join_labels(&["a"]), "a");
        assert_eq!(join_labels(&["a", "b"]), "a and b");
        assert_eq!(join_labels(&["a", "b", "c"]), "a, b and c");
    }

    #[test]
    fn phrasing_depends_on_missing_count() {
        let many = missing_fields_message(
            &["project name", "project description", "detailed requirements"],
            false,
        );
        assert!(many.contains("need several details"));
        assert!(many.contains("project name, project description and detailed requirements"));

        let two = missing_fields_message(&["project name", "technology stack"], true);
        assert!(two.contains("Could you tell me the project name and the technology stack?"));
        assert!(!two.contains("several"));
    }

    #[tokio::test]
    async fn forex_dashboard_scenario() {
        let h = Harness::new(script(vec![
            intent("generate"),
            (
                tag(names::EXTRACT_REQUIREMENTS),
                Reply::text(
                    r#"```json
{"name": null, "description": "A forex trading dashboard", "requirements": null,
 "techStack": ["React", "Node"], "financialDomain": "trading", "tradingVenue": "forex"}
```"#,
                ),
            ),
        ]));
        h.put(&crate::project::ProjectSnapshot::new("fx-dash"));

        let r = h
            .send("I want to build a forex trading dashboard in React and Node")
            .await;

        assert!(r.update_project);
        assert!(r.next_phase.is_none());
        let p = r.project_data.as_ref().unwrap();
        assert_eq!(p.financial_domain.as_deref(), Some("trading"));
        assert_eq!(p.trading_venue.as_deref(), Some("forex"));
        assert_eq!(p.tech_stack, vec!["React".to_string(), "Node".to_string()]);
        assert_eq!(p.status.as_deref(), Some(status::CREATED));
        assert!(r.message.contains("project name"));
        assert!(r.message.contains("detailed requirements"));
        assert_eq!(r.metadata["type"], "requirements_update");
        assert_eq!(
            r.metadata["missing"],
            json!(["project name", "detailed requirements"])
        );
    }

    #[tokio::test]
    async fn query_intent_does_not_mutate() {
        let h = Harness::new(script(vec![
            intent("query"),
            (tag(names::GENERAL_QUERY), Reply::text("A pip is 0.0001.")),
        ]));
        h.put(&crate::project::ProjectSnapshot::new("fx-dash"));

        let r = h.send("what is a pip?").await;
        assert_eq!(r.message, "A pip is 0.0001.");
        assert!(!r.update_project);
        assert!(h
            .service
            .prompts()
            .iter()
            .all(|p| !p.contains(&tag(names::EXTRACT_REQUIREMENTS))));
    }

    #[tokio::test]
    async fn empty_tech_stack_never_completes() {
        let h = Harness::new(script(vec![
            intent("generate"),
            (
                tag(names::EXTRACT_REQUIREMENTS),
                Reply::text(r#"{"techStack": []}"#),
            ),
        ]));
        let mut p = complete_project();
        p.tech_stack.clear();
        h.put(&p);

        let r = h.send("no particular stack yet").await;
        assert!(r.next_phase.is_none());
        assert!(!r.update_project);
        assert!(r.message.contains("technology stack"));
        let stored = h.store.read("fx-dash").unwrap().unwrap();
        assert_eq!(stored.status.as_deref(), Some(status::CREATED));
    }

    #[tokio::test]
    async fn tech_stack_completes_transition() {
        let h = Harness::new(script(vec![
            intent("modify"),
            (
                tag(names::EXTRACT_REQUIREMENTS),
                Reply::text(r#"{"techStack": "Rust"}"#),
            ),
        ]));
        let mut p = complete_project();
        p.tech_stack.clear();
        h.put(&p);

        let r = h.send("let's use Rust").await;
        assert!(r.update_project);
        assert_eq!(r.next_phase, Some(Phase::Blueprint));
        let p = r.project_data.unwrap();
        assert_eq!(p.status.as_deref(), Some(status::REQUIREMENTS_COMPLETED));
        assert_eq!(p.tech_stack, vec!["Rust".to_string()]);
        assert_eq!(r.metadata["type"], "requirements_complete");
    }

    #[tokio::test]
    async fn approve_in_requirements_phase_falls_through() {
        let h = Harness::new(script(vec![
            intent("approve"),
            (tag(names::EXTRACT_REQUIREMENTS), Reply::text("{}")),
        ]));
        h.put(&complete_project());

        let r = h.send("yes that's correct").await;
        assert_ne!(r.metadata["type"], "error");
        assert_eq!(r.metadata["intent"], "approve");
        assert_eq!(r.next_phase, Some(Phase::Blueprint));
    }

    #[tokio::test]
    async fn extraction_failure_keeps_project_unchanged() {
        let h = Harness::new(script(vec![
            intent("generate"),
            (
                tag(names::EXTRACT_REQUIREMENTS),
                Reply::text("I'm not sure what you mean."),
            ),
        ]));
        h.put(&crate::project::ProjectSnapshot::new("fx-dash"));

        let r = h.send("hmm").await;
        assert!(!r.update_project);
        assert!(r.message.contains("need several details"));
        assert_eq!(r.metadata["type"], "requirements_update");
    }

    #[tokio::test]
    async fn classifier_failure_defaults_to_general_query() {
        let h = Harness::new(script(vec![
            (tag(names::DETERMINE_INTENT), Reply::failed("overloaded upstream")),
            (tag(names::GENERAL_QUERY), Reply::text("Happy to help.")),
        ]));
        h.put(&crate::project::ProjectSnapshot::new("fx-dash"));

        let r = h.send("hello").await;
        assert_eq!(r.message, "Happy to help.");
        assert_eq!(r.metadata["type"], "general_query");
    }
}
