use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Requirements,
    Blueprint,
    Component,
    Support,
}

impl Phase {
    pub fn all() -> &'static [Phase] {
        &[
            Phase::Requirements,
            Phase::Blueprint,
            Phase::Component,
            Phase::Support,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Requirements => "requirements",
            Phase::Blueprint => "blueprint",
            Phase::Component => "component",
            Phase::Support => "support",
        }
    }

    /// Derive the phase from a project status string.
    ///
    /// Evaluated fresh on every message; the status is the only stored state.
    /// Unknown statuses fall back to `Requirements`.
    pub fn from_status(status: Option<&str>) -> Phase {
        let Some(s) = status else {
            return Phase::Requirements;
        };
        if s == status::CREATED {
            Phase::Requirements
        } else if s == status::REQUIREMENTS_COMPLETED || s.contains("blueprint") {
            Phase::Blueprint
        } else if s.contains("component") {
            Phase::Component
        } else if s == status::COMPLETED {
            Phase::Support
        } else {
            Phase::Requirements
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = crate::error::FinflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requirements" => Ok(Phase::Requirements),
            "blueprint" => Ok(Phase::Blueprint),
            "component" => Ok(Phase::Component),
            "support" => Ok(Phase::Support),
            _ => Err(crate::error::FinflowError::InvalidPhase(s.to_string())),
        }
    }
}

/// Well-known project status values written by the controller.
pub mod status {
    pub const CREATED: &str = "created";
    pub const REQUIREMENTS_COMPLETED: &str = "requirements_completed";
    pub const BLUEPRINT_GENERATED: &str = "blueprint_generated";
    pub const BLUEPRINT_APPROVED: &str = "blueprint_approved";
    pub const COMPONENT_GENERATION: &str = "component_generation";
    pub const COMPLETED: &str = "completed";
}

// ---------------------------------------------------------------------------
// Intent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Query,
    Generate,
    Modify,
    Approve,
    Reject,
}

impl Intent {
    pub fn all() -> &'static [Intent] {
        &[
            Intent::Query,
            Intent::Generate,
            Intent::Modify,
            Intent::Approve,
            Intent::Reject,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Query => "query",
            Intent::Generate => "generate",
            Intent::Modify => "modify",
            Intent::Approve => "approve",
            Intent::Reject => "reject",
        }
    }

    /// Parse raw model output into an intent.
    ///
    /// The output is trimmed and lower-cased. An exact label wins; otherwise
    /// the first word that is a label is used (models sometimes answer
    /// "Intent: generate."). Anything unrecognised is `Query`.
    pub fn from_label(raw: &str) -> Intent {
        let label = raw.trim().to_lowercase();
        if let Some(intent) = Self::exact(&label) {
            return intent;
        }
        label
            .split(|c: char| !c.is_ascii_alphabetic())
            .find_map(Self::exact)
            .unwrap_or(Intent::Query)
    }

    fn exact(label: &str) -> Option<Intent> {
        Self::all().iter().copied().find(|i| i.as_str() == label)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TemplateCategory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    #[default]
    General,
    Requirements,
    Blueprint,
    Component,
    Support,
    Chat,
}

impl TemplateCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateCategory::General => "general",
            TemplateCategory::Requirements => "requirements",
            TemplateCategory::Blueprint => "blueprint",
            TemplateCategory::Component => "component",
            TemplateCategory::Support => "support",
            TemplateCategory::Chat => "chat",
        }
    }
}

impl fmt::Display for TemplateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TemplateCategory {
    type Err = crate::error::FinflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(TemplateCategory::General),
            "requirements" => Ok(TemplateCategory::Requirements),
            "blueprint" => Ok(TemplateCategory::Blueprint),
            "component" => Ok(TemplateCategory::Component),
            "support" => Ok(TemplateCategory::Support),
            "chat" => Ok(TemplateCategory::Chat),
            _ => Err(crate::error::FinflowError::InvalidCategory(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ComponentStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentStatus::Pending => "pending",
            ComponentStatus::InProgress => "in_progress",
            ComponentStatus::Completed => "completed",
            ComponentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
