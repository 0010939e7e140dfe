use crate::types::TemplateCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// TemplateVariable
// ---------------------------------------------------------------------------

/// A declared `{{name}}` placeholder of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateVariable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub required: bool,
}

fn default_kind() -> String {
    "string".to_string()
}

impl TemplateVariable {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            kind: default_kind(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name)
        }
    }
}

// ---------------------------------------------------------------------------
// PromptTemplate
// ---------------------------------------------------------------------------

/// One stored version of a named prompt template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: Uuid,
    pub name: String,
    pub version: u32,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: TemplateCategory,
    #[serde(default)]
    pub variables: Vec<TemplateVariable>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PromptTemplate {
    /// Build version `version` of `new`. The store decides the version.
    pub(crate) fn from_new(new: NewTemplate, version: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: new.name,
            version,
            content: new.content,
            description: new.description,
            tags: new.tags,
            category: new.category,
            variables: new.variables,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn required_variables(&self) -> impl Iterator<Item = &str> {
        self.variables
            .iter()
            .filter(|v| v.required)
            .map(|v| v.name.as_str())
    }

    /// Apply `patch` to this version. Name and version never change.
    pub(crate) fn apply(&mut self, patch: TemplatePatch) {
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// NewTemplate / TemplatePatch
// ---------------------------------------------------------------------------

/// Input to `create_template`. Carries no version: the store assigns one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: TemplateCategory,
    #[serde(default)]
    pub variables: Vec<TemplateVariable>,
}

impl NewTemplate {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn category(mut self, category: TemplateCategory) -> Self {
        self.category = category;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn variable(mut self, variable: TemplateVariable) -> Self {
        self.variables.push(variable);
        self
    }
}

/// Fields `update_template` may change on an existing version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplatePatch {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl TemplatePatch {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.description.is_none() && self.tags.is_none()
    }
}

// ---------------------------------------------------------------------------
// ProjectPromptOverride
// ---------------------------------------------------------------------------

/// A project-scoped version of a template, resolved ahead of the global one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectPromptOverride {
    pub project_id: String,
    /// Id of the global template this override was derived from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub based_on: Option<Uuid>,
    #[serde(flatten)]
    pub template: PromptTemplate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_variables_filters_optional() {
        let new = NewTemplate::new("t", "{{a}} {{b}}")
            .variable(TemplateVariable::required("a"))
            .variable(TemplateVariable::optional("b"));
        let t = PromptTemplate::from_new(new, 1);
        assert_eq!(t.required_variables().collect::<Vec<_>>(), vec!["a"]);
        assert!(t.active);
    }

    #[test]
    fn apply_patch_keeps_identity() {
        let mut t = PromptTemplate::from_new(NewTemplate::new("t", "old"), 4);
        let before = t.updated_at;
        t.apply(TemplatePatch {
            content: Some("new".into()),
            tags: Some(vec!["x".into()]),
            ..Default::default()
        });
        assert_eq!(t.name, "t");
        assert_eq!(t.version, 4);
        assert_eq!(t.content, "new");
        assert_eq!(t.tags, vec!["x".to_string()]);
        assert!(t.description.is_none());
        assert!(t.updated_at >= before);
    }

    #[test]
    fn variable_kind_serializes_as_type() {
        let v = TemplateVariable::required("message");
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["type"], "string");
        assert_eq!(json["required"], true);
    }

    #[test]
    fn override_flattens_template_fields() {
        let o = ProjectPromptOverride {
            project_id: "fx-dash".into(),
            based_on: None,
            template: PromptTemplate::from_new(NewTemplate::new("general_query", "hi"), 1),
        };
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["project_id"], "fx-dash");
        assert_eq!(json["name"], "general_query");
        let back: ProjectPromptOverride = serde_json::from_value(json).unwrap();
        assert_eq!(back, o);
    }
}
