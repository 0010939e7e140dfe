use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FinflowError, Result};
use crate::extract::ExtractedRequirements;
use crate::{io, paths};
use crate::types::{status, ComponentStatus, Phase};

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// One buildable part of a project's blueprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ComponentStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            status: ComponentStatus::Pending,
            dependencies: Vec::new(),
            code: None,
            updated_at: None,
        }
    }

    pub fn set_status(&mut self, status: ComponentStatus) {
        self.status = status;
        self.updated_at = Some(Utc::now());
    }
}

// ---------------------------------------------------------------------------
// ProjectSnapshot
// ---------------------------------------------------------------------------

/// The project fields the conversation engine reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub requirements: Option<String>,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub financial_domain: Option<String>,
    #[serde(default)]
    pub trading_venue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blueprint: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
    #[serde(default)]
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn present(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.trim().is_empty())
}

impl ProjectSnapshot {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: Some(status::CREATED.to_string()),
            name: None,
            description: None,
            requirements: None,
            tech_stack: Vec::new(),
            financial_domain: None,
            trading_venue: None,
            blueprint: None,
            components: Vec::new(),
            owner: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_status(self.status.as_deref())
    }

    pub fn set_status(&mut self, status: &str) {
        self.status = Some(status.to_string());
        self.updated_at = Utc::now();
    }

    // -----------------------------------------------------------------------
    // Requirements
    // -----------------------------------------------------------------------

    /// Labels of the required fields that are still absent, in asking order.
    pub fn missing_requirements(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !present(&self.name) {
            missing.push("project name");
        }
        if !present(&self.description) {
            missing.push("project description");
        }
        if !present(&self.requirements) {
            missing.push("detailed requirements");
        }
        if self.tech_stack.iter().all(|t| t.trim().is_empty()) {
            missing.push("technology stack");
        }
        missing
    }

    /// Name, description, requirements and a non-empty tech stack are set.
    pub fn requirements_complete(&self) -> bool {
        self.missing_requirements().is_empty()
    }

    /// Copy every present extracted field over the project. Blank strings and
    /// empty lists count as absent. Returns whether anything changed.
    pub fn merge(&mut self, extracted: &ExtractedRequirements) -> bool {
        fn take(dst: &mut Option<String>, src: &Option<String>) -> bool {
            match src.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() && dst.as_deref() != Some(v) => {
                    *dst = Some(v.to_string());
                    true
                }
                _ => false,
            }
        }

        let mut changed = false;
        changed |= take(&mut self.name, &extracted.name);
        changed |= take(&mut self.description, &extracted.description);
        changed |= take(&mut self.requirements, &extracted.requirements);
        changed |= take(&mut self.financial_domain, &extracted.financial_domain);
        changed |= take(&mut self.trading_venue, &extracted.trading_venue);

        if let Some(stack) = &extracted.tech_stack {
            let stack: Vec<String> = stack
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            if !stack.is_empty() && stack != self.tech_stack {
                self.tech_stack = stack;
                changed = true;
            }
        }

        if changed {
            self.updated_at = Utc::now();
        }
        changed
    }

    /// Plain-text summary used as `project_context` in prompts.
    pub fn context(&self) -> String {
        let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "(not set)".to_string());
        let stack = if self.tech_stack.is_empty() {
            "(not set)".to_string()
        } else {
            self.tech_stack.join(", ")
        };
        format!(
            "Name: {}\nDescription: {}\nRequirements: {}\nTech stack: {}\nFinancial domain: {}\nTrading venue: {}",
            field(&self.name),
            field(&self.description),
            field(&self.requirements),
            stack,
            field(&self.financial_domain),
            field(&self.trading_venue),
        )
    }

    // -----------------------------------------------------------------------
    // Components
    // -----------------------------------------------------------------------

    /// Index of the first pending component whose dependencies are all
    /// completed.
    ///
    /// A dependency that names no known component counts as unmet.
    pub fn next_eligible_component(&self) -> Option<usize> {
        self.components.iter().position(|c| {
            c.status == ComponentStatus::Pending
                && c.dependencies.iter().all(|dep| {
                    self.components
                        .iter()
                        .any(|other| &other.name == dep && other.status == ComponentStatus::Completed)
                })
        })
    }
}

// ---------------------------------------------------------------------------
// ProjectRepository
// ---------------------------------------------------------------------------

/// Where project snapshots live between turns.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// `Ok(None)` when no project has this id.
    async fn load(&self, id: &str) -> Result<Option<ProjectSnapshot>>;

    async fn save(&self, project: &ProjectSnapshot) -> Result<()>;
}

// ---------------------------------------------------------------------------
// YamlProjectStore
// ---------------------------------------------------------------------------

/// Stores each project at `.finflow/projects/<id>/project.yaml`.
#[derive(Debug, Clone)]
pub struct YamlProjectStore {
    root: PathBuf,
}

impl YamlProjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn create(&self, id: &str, name: Option<String>, owner: Option<String>) -> Result<ProjectSnapshot> {
        paths::validate_project_id(id)?;
        if paths::project_file(&self.root, id).exists() {
            return Err(FinflowError::ProjectExists(id.to_string()));
        }
        let mut project = ProjectSnapshot::new(id);
        project.name = name;
        project.owner = owner;
        self.write(&project)?;
        Ok(project)
    }

    pub fn read(&self, id: &str) -> Result<Option<ProjectSnapshot>> {
        paths::validate_project_id(id)?;
        io::read_yaml(&paths::project_file(&self.root, id))
    }

    pub fn write(&self, project: &ProjectSnapshot) -> Result<()> {
        paths::validate_project_id(&project.id)?;
        io::write_yaml(&paths::project_file(&self.root, &project.id), project)
    }

    pub fn list(&self) -> Result<Vec<ProjectSnapshot>> {
        let dir = self.root.join(paths::PROJECTS_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut projects = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            match self.read(&id) {
                Ok(Some(p)) => projects.push(p),
                Ok(None) | Err(FinflowError::InvalidProjectId(_)) => {}
                Err(e) => return Err(e),
            }
        }
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(projects)
    }
}

#[async_trait]
impl ProjectRepository for YamlProjectStore {
    async fn load(&self, id: &str) -> Result<Option<ProjectSnapshot>> {
        self.read(id)
    }

    async fn save(&self, project: &ProjectSnapshot) -> Result<()> {
        self.write(project)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
