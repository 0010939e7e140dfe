use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::decode::{decode_json, strip_code_fence};
use crate::defaults::names;
use crate::error::{FinflowError, Result};
use crate::pipeline::{vars, PromptRunner, Turn};
use crate::project::{Component, ProjectSnapshot};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A generated blueprint and the components it lays out.
#[derive(Debug, Clone)]
pub struct GeneratedBlueprint {
    pub blueprint: Value,
    pub components: Vec<Component>,
}

#[async_trait]
pub trait BlueprintGenerator: Send + Sync {
    async fn generate(&self, project: &ProjectSnapshot, turn: Turn<'_>) -> Result<GeneratedBlueprint>;
}

#[async_trait]
pub trait ComponentGenerator: Send + Sync {
    /// Produce the code for `component`.
    async fn generate(
        &self,
        project: &ProjectSnapshot,
        component: &Component,
        turn: Turn<'_>,
    ) -> Result<String>;
}

// ---------------------------------------------------------------------------
// PromptedBlueprintGenerator
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ComponentSpec {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
}

/// Generates a blueprint with the `generate_blueprint` template.
pub struct PromptedBlueprintGenerator {
    runner: Arc<PromptRunner>,
}

impl PromptedBlueprintGenerator {
    pub fn new(runner: Arc<PromptRunner>) -> Self {
        Self { runner }
    }
}

/// Split the model's blueprint object into the blueprint and its components.
fn parse_blueprint(raw: &str) -> Result<GeneratedBlueprint> {
    let blueprint: Value = decode_json(raw)
        .map_err(|e| FinflowError::Generation(format!("blueprint is not valid JSON: {e}")))?;
    if !blueprint.is_object() {
        return Err(FinflowError::Generation(
            "blueprint must be a JSON object".to_string(),
        ));
    }

    let specs: Vec<ComponentSpec> = match blueprint.get("components") {
        Some(list) => serde_json::from_value(list.clone())
            .map_err(|e| FinflowError::Generation(format!("invalid component list: {e}")))?,
        None => Vec::new(),
    };
    if specs.is_empty() {
        return Err(FinflowError::Generation(
            "blueprint lists no components".to_string(),
        ));
    }
    {
        let mut seen = HashSet::new();
        if let Some(dup) = specs.iter().find(|spec| !seen.insert(spec.name.as_str())) {
            return Err(FinflowError::Generation(format!(
                "blueprint lists component '{}' more than once",
                dup.name
            )));
        }
    }

    let components = specs
        .into_iter()
        .map(|spec| {
            let mut c = Component::new(spec.name);
            c.description = spec.description;
            c.dependencies = spec.dependencies;
            c
        })
        .collect();
    Ok(GeneratedBlueprint {
        blueprint,
        components,
    })
}

#[async_trait]
impl BlueprintGenerator for PromptedBlueprintGenerator {
    async fn generate(&self, project: &ProjectSnapshot, turn: Turn<'_>) -> Result<GeneratedBlueprint> {
        let variables = vars([("project_context", project.context())]);
        let completion = self
            .runner
            .run(turn, names::GENERATE_BLUEPRINT, &variables)
            .await?;
        parse_blueprint(&completion.content)
    }
}

// ---------------------------------------------------------------------------
// PromptedComponentGenerator
// ---------------------------------------------------------------------------

/// Generates component code with the `generate_component` template.
pub struct PromptedComponentGenerator {
    runner: Arc<PromptRunner>,
}

impl PromptedComponentGenerator {
    pub fn new(runner: Arc<PromptRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ComponentGenerator for PromptedComponentGenerator {
    async fn generate(
        &self,
        project: &ProjectSnapshot,
        component: &Component,
        turn: Turn<'_>,
    ) -> Result<String> {
        let blueprint = project
            .blueprint
            .as_ref()
            .map(|b| b.to_string())
            .unwrap_or_default();
        let variables = vars([
            ("component_name", component.name.clone()),
            (
                "component_description",
                component.description.clone().unwrap_or_default(),
            ),
            ("project_context", project.context()),
            ("blueprint", blueprint),
        ]);
        let completion = self
            .runner
            .run(turn, names::GENERATE_COMPONENT, &variables)
            .await?;

        let code = strip_code_fence(&completion.content);
        if code.is_empty() {
            return Err(FinflowError::Generation(format!(
                "empty output for component '{}'",
                component.name
            )));
        }
        Ok(code.to_string())
    }
}
