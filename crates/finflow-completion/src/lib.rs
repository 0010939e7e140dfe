//! `finflow-completion`: the text-generation boundary of the finflow engine.
//!
//! # Architecture
//!
//! ```text
//! CompletionGateway   ← retry/backoff on RateLimited, everything else fails fast
//!     │
//!     ▼
//! dyn CompletionService
//!     │
//!     ▼
//! ClaudeCliService    ← spawns `claude --output-format stream-json …`
//!     │                  reads JSONL until the terminal `result` message
//!     ▼
//! Completion { content, usage, latency }
//! ```
//!
//! The engine only ever talks to [`CompletionGateway`]; tests substitute their
//! own [`CompletionService`].

pub mod cli;
pub mod error;
pub mod gateway;
pub mod service;
pub mod types;

pub(crate) mod process;

pub use cli::ClaudeCliService;
pub use error::CompletionError;
pub use gateway::{CompletionGateway, RetryPolicy};
pub use service::CompletionService;
pub use types::{Completion, CompletionOptions, TokenUsage};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, CompletionError>;
