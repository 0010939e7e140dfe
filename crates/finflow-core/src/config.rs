use crate::error::{FinflowError, Result};
use crate::{io, paths};
use finflow_completion::{CompletionOptions, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// CompletionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_executable")]
    pub executable: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_executable() -> String {
    "claude".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-6".to_string()
}

fn default_max_turns() -> u32 {
    1
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            model: default_model(),
            max_turns: default_max_turns(),
            system_prompt: None,
        }
    }
}

impl CompletionConfig {
    pub fn options(&self) -> CompletionOptions {
        CompletionOptions {
            system_prompt: self.system_prompt.clone(),
            model: Some(self.model.clone()),
            max_turns: Some(self.max_turns),
        }
    }
}

// ---------------------------------------------------------------------------
// RetryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.base_delay_ms))
    }
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_database")]
    pub database: PathBuf,
}

fn default_database() -> PathBuf {
    PathBuf::from(paths::DEFAULT_DATABASE)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        io::read_yaml(&paths::config_path(root))?.ok_or(FinflowError::NotInitialized)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        io::write_yaml(&paths::config_path(root), self)
    }

    /// Absolute path of the prompt database for this workspace.
    pub fn database_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.store.database)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.completion.executable.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "completion.executable is empty".to_string(),
            });
        }

        if self.completion.model.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "completion.model is empty".to_string(),
            });
        }

        if self.completion.max_turns == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "completion.max_turns must be at least 1".to_string(),
            });
        }

        if self.retry.base_delay_ms == 0 && self.retry.max_retries > 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "retry.base_delay_ms is 0: rate-limited calls retry without backoff"
                    .to_string(),
            });
        }

        if self.retry.max_retries > 10 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "retry.max_retries is {}: a throttled turn may wait a very long time",
                    self.retry.max_retries
                ),
            });
        }

        if self.store.database.as_os_str().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "store.database is empty".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
