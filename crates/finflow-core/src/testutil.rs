//! Test doubles shared by the unit tests of this crate.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use finflow_completion::{
    Completion, CompletionError, CompletionGateway, CompletionOptions, CompletionService,
    RetryPolicy, TokenUsage,
};
use tempfile::TempDir;

use crate::defaults::{default_templates, seed_default_templates};
use crate::pipeline::PromptRunner;
use crate::store::PromptDb;
use crate::template::TemplatePatch;

/// What a scripted rule answers with.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Text(String),
    Failed(String),
    RateLimited(String),
}

impl Reply {
    pub(crate) fn text(s: impl Into<String>) -> Self {
        Reply::Text(s.into())
    }

    pub(crate) fn failed(s: impl Into<String>) -> Self {
        Reply::Failed(s.into())
    }
}

/// A completion service answering from `(needle, reply)` rules: the first
/// rule whose needle occurs in the prompt wins. Unmatched prompts fail.
#[derive(Default)]
pub(crate) struct ScriptedService {
    rules: Vec<(String, Reply)>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(mut self, needle: impl Into<String>, reply: Reply) -> Self {
        self.rules.push((needle.into(), reply));
        self
    }

    /// Every prompt received so far, in order.
    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        prompt: &str,
        _options: &CompletionOptions,
    ) -> finflow_completion::Result<Completion> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone());
        match reply {
            Some(Reply::Text(content)) => Ok(Completion {
                content,
                usage: TokenUsage::new(12, 4),
                latency: Duration::from_millis(5),
            }),
            Some(Reply::Failed(msg)) => Err(CompletionError::Failed(msg)),
            Some(Reply::RateLimited(msg)) => Err(CompletionError::RateLimited(msg)),
            None => Err(CompletionError::Failed(format!(
                "no scripted reply for prompt: {prompt}"
            ))),
        }
    }
}

/// Marker prepended to each seeded default template so tests can route a
/// prompt by template name, e.g. `tag("determine_intent")`.
pub(crate) fn tag(template: &str) -> String {
    format!("[{template}]")
}

/// A temp database seeded with the default templates (each tagged) and a
/// runner over `service` that never backs off.
pub(crate) fn seeded_runner(service: Arc<ScriptedService>) -> (TempDir, Arc<PromptRunner>) {
    let dir = TempDir::new().unwrap();
    let db = PromptDb::open(&dir.path().join("prompts.db")).unwrap();
    seed_default_templates(&db).unwrap();
    for new in default_templates() {
        db.update_template(
            &new.name,
            1,
            TemplatePatch {
                content: Some(format!("{}\n{}", tag(&new.name), new.content)),
                ..Default::default()
            },
        )
        .unwrap();
    }
    let gateway = CompletionGateway::new(service, RetryPolicy::new(0, Duration::ZERO));
    let runner = Arc::new(PromptRunner::new(Arc::new(db), gateway));
    (dir, runner)
}
