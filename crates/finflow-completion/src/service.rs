use async_trait::async_trait;

use crate::types::{Completion, CompletionOptions};
use crate::Result;

/// A text-generation backend: one prompt in, one completion out.
///
/// Implementations report provider throttling as
/// [`CompletionError::RateLimited`](crate::CompletionError::RateLimited) so the
/// [`CompletionGateway`](crate::CompletionGateway) can back off and retry.
/// They do not retry on their own.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Short identifier used in logs (e.g. `"claude-cli"`).
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<Completion>;
}
