use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompletionError {
    /// The provider asked us to slow down. Retried by the gateway.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Any other provider failure, carrying the provider's message.
    #[error("completion failed: {0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse stream-json line: {source}\n  line: {line}")]
    Parse {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Process error: {0}")]
    Process(String),
}

impl CompletionError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CompletionError::RateLimited(_))
    }

    /// Collapse any non-rate-limit error into `Failed`, keeping its message.
    pub fn into_failed(self) -> CompletionError {
        match self {
            CompletionError::RateLimited(_) | CompletionError::Failed(_) => self,
            other => CompletionError::Failed(other.to_string()),
        }
    }
}

/// True if a provider message reads like a rate-limit or overload signal.
pub fn looks_rate_limited(text: &str) -> bool {
    let lower = text.to_lowercase();
    ["rate limit", "rate_limit", "ratelimit", "429", "overloaded", "too many requests"]
        .iter()
        .any(|marker| lower.contains(marker))
}
