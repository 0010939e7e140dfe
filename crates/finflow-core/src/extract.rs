use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::decode::decode_json;
use crate::defaults::names;
use crate::error::{FinflowError, Result};
use crate::pipeline::{vars, PromptRunner, Turn};

// ---------------------------------------------------------------------------
// ExtractedRequirements
// ---------------------------------------------------------------------------

/// Requirement fields found in one message. Every field is independently
/// absent; keys are accepted in camelCase or snake_case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedRequirements {
    #[serde(deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub requirements: Option<String>,
    #[serde(alias = "techStack", deserialize_with = "one_or_many")]
    pub tech_stack: Option<Vec<String>>,
    #[serde(alias = "financialDomain", deserialize_with = "lenient_text")]
    pub financial_domain: Option<String>,
    #[serde(alias = "tradingVenue", deserialize_with = "lenient_text")]
    pub trading_venue: Option<String>,
}

impl ExtractedRequirements {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Strings as-is, numbers and booleans as text, arrays joined with "; ".
fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => {
            let parts: Vec<String> = items.into_iter().filter_map(scalar_text).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        other => scalar_text(other),
    })
}

/// An array of technologies, or a single scalar wrapped into one.
fn one_or_many<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<Vec<String>>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => None,
        Value::Array(items) => Some(items.into_iter().filter_map(scalar_text).collect()),
        other => scalar_text(other).map(|s| vec![s]),
    })
}

// ---------------------------------------------------------------------------
// RequirementsExtractor
// ---------------------------------------------------------------------------

/// Turns a free-form message into [`ExtractedRequirements`] via the
/// `extract_requirements` template.
#[derive(Clone)]
pub struct RequirementsExtractor {
    runner: Arc<PromptRunner>,
}

impl RequirementsExtractor {
    pub fn new(runner: Arc<PromptRunner>) -> Self {
        Self { runner }
    }

    /// Extract requirement fields from `message`.
    ///
    /// Completion failures, a missing template and unparseable output all
    /// yield an empty result. Rendering errors are returned.
    pub async fn extract(&self, message: &str, turn: Turn<'_>) -> Result<ExtractedRequirements> {
        let variables = vars([("message", message.to_string())]);
        let completion = match self
            .runner
            .run(turn, names::EXTRACT_REQUIREMENTS, &variables)
            .await
        {
            Ok(c) => c,
            Err(e @ (FinflowError::Completion(_) | FinflowError::TemplateNotFound(_))) => {
                tracing::error!(
                    project = turn.project_id,
                    error = %e,
                    "requirements extraction failed"
                );
                return Ok(ExtractedRequirements::default());
            }
            Err(e) => return Err(e),
        };

        match decode_json::<ExtractedRequirements>(&completion.content) {
            Ok(extracted) => Ok(extracted),
            Err(e) => {
                tracing::error!(
                    project = turn.project_id,
                    error = %e,
                    "could not parse extracted requirements"
                );
                Ok(ExtractedRequirements::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seeded_runner, tag, Reply, ScriptedService};

    async fn extract_with(reply: Reply) -> ExtractedRequirements {
        let service =
            Arc::new(ScriptedService::new().on(tag(names::EXTRACT_REQUIREMENTS), reply));
        let (_dir, runner) = seeded_runner(service);
        RequirementsExtractor::new(runner)
            .extract("anything", Turn::for_project("fx-dash"))
            .await
            .unwrap()
    }

    #[test]
    fn missing_keys_default_to_none() {
        let r: ExtractedRequirements = serde_json::from_str(r#"{"name": "FX Dash"}"#).unwrap();
        assert_eq!(r.name.as_deref(), Some("FX Dash"));
        assert!(r.tech_stack.is_none());
        assert!(r.description.is_none());
    }

    #[test]
    fn camel_and_snake_keys() {
        let camel: ExtractedRequirements =
            serde_json::from_str(r#"{"techStack": ["Rust"], "tradingVenue": "forex"}"#).unwrap();
        let snake: ExtractedRequirements =
            serde_json::from_str(r#"{"tech_stack": ["Rust"], "trading_venue": "forex"}"#).unwrap();
        assert_eq!(camel, snake);
    }

    #[test]
    fn scalar_tech_stack_is_wrapped() {
        let r: ExtractedRequirements = serde_json::from_str(r#"{"techStack": "React"}"#).unwrap();
        assert_eq!(r.tech_stack, Some(vec!["React".to_string()]));
        let r: ExtractedRequirements = serde_json::from_str(r#"{"techStack": null}"#).unwrap();
        assert!(r.tech_stack.is_none());
    }

    #[test]
    fn list_requirements_are_joined() {
        let r: ExtractedRequirements =
            serde_json::from_str(r#"{"requirements": ["live quotes", "order entry"]}"#).unwrap();
        assert_eq!(r.requirements.as_deref(), Some("live quotes; order entry"));
    }

    #[tokio::test]
    async fn fenced_json_is_extracted() {
        let r = extract_with(Reply::text(
            "```json\n{\"financialDomain\": \"trading\", \"tradingVenue\": \"forex\", \"techStack\": [\"React\", \"Node\"]}\n```",
        ))
        .await;
        assert_eq!(r.financial_domain.as_deref(), Some("trading"));
        assert_eq!(r.trading_venue.as_deref(), Some("forex"));
        assert_eq!(
            r.tech_stack,
            Some(vec!["React".to_string(), "Node".to_string()])
        );
        assert!(r.name.is_none());
    }

    #[tokio::test]
    async fn prose_yields_empty_result() {
        let r = extract_with(Reply::text("Sorry, I could not find any requirements.")).await;
        assert!(r.is_empty());
    }

    #[tokio::test]
    async fn completion_failure_yields_empty_result() {
        let r = extract_with(Reply::failed("service unavailable")).await;
        assert!(r.is_empty());
    }
}
