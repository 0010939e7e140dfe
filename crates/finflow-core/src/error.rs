use finflow_completion::CompletionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FinflowError {
    #[error("not initialized: run 'finflow init'")]
    NotInitialized,

    #[error("template '{template}' is missing required variables: {}", names.join(", "))]
    MissingVariable { template: String, names: Vec<String> },

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("project already exists: {0}")]
    ProjectExists(String),

    #[error("invalid project id '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidProjectId(String),

    #[error("invalid template name '{0}': must be lowercase alphanumeric with underscores")]
    InvalidTemplateName(String),

    #[error("unknown category: {0}")]
    InvalidCategory(String),

    #[error("invalid phase: {0}")]
    InvalidPhase(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl FinflowError {
    /// Errors the conversation controller must hand back to its caller
    /// instead of turning them into an apology message.
    pub fn is_fatal_for_turn(&self) -> bool {
        matches!(
            self,
            FinflowError::MissingVariable { .. } | FinflowError::ProjectNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FinflowError>;

/// Map any storage-layer error into [`FinflowError::Store`].
pub(crate) fn store_err(e: impl std::fmt::Display) -> FinflowError {
    FinflowError::Store(e.to_string())
}
