use std::collections::HashMap;
use std::sync::Arc;

use finflow_completion::{Completion, CompletionGateway, CompletionOptions, TokenUsage};

use crate::error::{FinflowError, Result};
use crate::recorder::{PerformanceRecorder, TemplateRef};
use crate::render::render;
use crate::store::PromptDb;

/// Identifies the conversation a completion call belongs to.
#[derive(Debug, Clone, Copy)]
pub struct Turn<'a> {
    pub project_id: &'a str,
    pub conversation_id: &'a str,
}

impl<'a> Turn<'a> {
    /// A turn whose conversation is the project itself.
    pub fn for_project(project_id: &'a str) -> Self {
        Self {
            project_id,
            conversation_id: project_id,
        }
    }
}

/// Resolve a template for the turn's project, render it, run it through the
/// gateway and record the outcome.
pub struct PromptRunner {
    store: Arc<PromptDb>,
    gateway: CompletionGateway,
    recorder: PerformanceRecorder,
    options: CompletionOptions,
}

impl PromptRunner {
    pub fn new(store: Arc<PromptDb>, gateway: CompletionGateway) -> Self {
        let recorder = PerformanceRecorder::new(store.clone());
        Self {
            store,
            gateway,
            recorder,
            options: CompletionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &PromptDb {
        &self.store
    }

    pub async fn run(
        &self,
        turn: Turn<'_>,
        template_name: &str,
        variables: &HashMap<String, String>,
    ) -> Result<Completion> {
        let Some(template) = self
            .store
            .get_project_template(turn.project_id, template_name, None)?
        else {
            self.recorder.record(
                TemplateRef {
                    id: None,
                    name: template_name,
                },
                turn.conversation_id,
                TokenUsage::default(),
                0,
                false,
                Some("template not found".to_string()),
            );
            return Err(FinflowError::TemplateNotFound(template_name.to_string()));
        };

        let prompt = render(&template, variables)?;

        tracing::debug!(
            template = %template.name,
            version = template.version,
            project = turn.project_id,
            "running prompt"
        );

        let started = tokio::time::Instant::now();
        match self.gateway.complete(&prompt, &self.options).await {
            Ok(completion) => {
                self.recorder.record(
                    (&template).into(),
                    turn.conversation_id,
                    completion.usage,
                    completion.latency.as_millis() as u64,
                    true,
                    None,
                );
                Ok(completion)
            }
            Err(e) => {
                self.recorder.record(
                    (&template).into(),
                    turn.conversation_id,
                    TokenUsage::default(),
                    started.elapsed().as_millis() as u64,
                    false,
                    Some(e.to_string()),
                );
                Err(e.into())
            }
        }
    }
}

/// Build a variable map from `(key, value)` pairs.
pub fn vars<const N: usize>(pairs: [(&str, String); N]) -> HashMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PerformanceFilter;
    use crate::template::{NewTemplate, TemplateVariable};
    use crate::testutil::{Reply, ScriptedService};
    use finflow_completion::RetryPolicy;
    use std::time::Duration;

    fn runner(service: Arc<ScriptedService>) -> (tempfile::TempDir, Arc<PromptDb>, PromptRunner) {
        let dir = tempfile::TempDir::new().unwrap();
        let db = Arc::new(PromptDb::open(&dir.path().join("p.db")).unwrap());
        let gateway = CompletionGateway::new(service, RetryPolicy::new(0, Duration::ZERO));
        let runner = PromptRunner::new(db.clone(), gateway);
        (dir, db, runner)
    }

    #[tokio::test]
    async fn success_is_rendered_and_recorded() {
        let service = Arc::new(ScriptedService::new().on("Echo:", Reply::text("pong")));
        let (_dir, db, runner) = runner(service.clone());
        let t = db
            .create_template(
                NewTemplate::new("echo", "Echo: {{message}}")
                    .variable(TemplateVariable::required("message")),
            )
            .unwrap();

        let out = runner
            .run(
                Turn::for_project("fx-dash"),
                "echo",
                &vars([("message", "ping".to_string())]),
            )
            .await
            .unwrap();
        assert_eq!(out.content, "pong");
        assert_eq!(service.prompts(), vec!["Echo: ping".to_string()]);

        let records = db.list_performance(&PerformanceFilter::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].template_id, Some(t.id));
        assert_eq!(records[0].conversation_id, "fx-dash");
        assert!(records[0].success);
    }

    #[tokio::test]
    async fn failure_is_recorded_and_returned() {
        let service = Arc::new(ScriptedService::new().on("Echo:", Reply::failed("boom")));
        let (_dir, db, runner) = runner(service);
        db.create_template(NewTemplate::new("echo", "Echo: {{message}}"))
            .unwrap();

        let err = runner
            .run(Turn::for_project("fx-dash"), "echo", &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FinflowError::Completion(_)));

        let records = db.list_performance(&PerformanceFilter::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].success);
        assert!(records[0].error_details.as_deref().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn missing_template_is_an_error() {
        let service = Arc::new(ScriptedService::new());
        let (_dir, db, runner) = runner(service.clone());
        let err = runner
            .run(Turn::for_project("fx-dash"), "nope", &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FinflowError::TemplateNotFound(ref n) if n == "nope"));
        assert!(service.prompts().is_empty());

        let records = db.list_performance(&PerformanceFilter::default()).unwrap();
        assert_eq!(records[0].template_id, None);
    }

    #[tokio::test]
    async fn missing_variable_skips_the_gateway() {
        let service = Arc::new(ScriptedService::new());
        let (_dir, db, runner) = runner(service.clone());
        db.create_template(
            NewTemplate::new("echo", "Echo: {{message}}")
                .variable(TemplateVariable::required("message")),
        )
        .unwrap();
        let err = runner
            .run(Turn::for_project("fx-dash"), "echo", &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FinflowError::MissingVariable { .. }));
        assert!(service.prompts().is_empty());
    }

    #[tokio::test]
    async fn project_override_is_used() {
        let service = Arc::new(ScriptedService::new().on("", Reply::text("ok")));
        let (_dir, db, runner) = runner(service.clone());
        db.create_template(NewTemplate::new("echo", "global")).unwrap();
        db.create_project_template("fx-dash", NewTemplate::new("echo", "override"), None)
            .unwrap();

        runner
            .run(Turn::for_project("fx-dash"), "echo", &HashMap::new())
            .await
            .unwrap();
        runner
            .run(Turn::for_project("other"), "echo", &HashMap::new())
            .await
            .unwrap();
        assert_eq!(
            service.prompts(),
            vec!["override".to_string(), "global".to_string()]
        );
    }
}
