use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::looks_rate_limited;
use crate::process::ClaudeProcess;
use crate::service::CompletionService;
use crate::types::{Completion, CompletionOptions, ContentBlock, Message, ResultMessage};
use crate::{CompletionError, Result};

/// [`CompletionService`] backed by the `claude` CLI in stream-json mode.
///
/// Each call spawns one subprocess, sends the prompt, and waits for the
/// terminal `result` message. Error results that mention a rate limit or an
/// overload become `RateLimited`; everything else becomes `Failed`.
#[derive(Debug, Clone)]
pub struct ClaudeCliService {
    executable: String,
    cwd: Option<PathBuf>,
    default_model: Option<String>,
}

impl ClaudeCliService {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            cwd: None,
            default_model: None,
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }
}

impl Default for ClaudeCliService {
    fn default() -> Self {
        Self::new("claude")
    }
}

fn provider_error(text: String) -> CompletionError {
    if looks_rate_limited(&text) {
        CompletionError::RateLimited(text)
    } else {
        CompletionError::Failed(text)
    }
}

#[async_trait]
impl CompletionService for ClaudeCliService {
    fn name(&self) -> &str {
        "claude-cli"
    }

    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<Completion> {
        let started = tokio::time::Instant::now();

        let mut opts = options.clone();
        if opts.model.is_none() {
            opts.model = self.default_model.clone();
        }

        let mut process =
            ClaudeProcess::spawn(&self.executable, self.cwd.as_ref(), prompt, &opts).await?;

        // Assistant text is kept as a fallback for results with an empty body.
        let mut streamed_text = String::new();
        let outcome = loop {
            match process.next_message().await {
                Err(e) => break Err(e),
                Ok(None) => break Ok(None),
                Ok(Some(Message::Result(r))) => break Ok(Some(r)),
                Ok(Some(Message::Assistant(a))) => {
                    for block in a.message.content {
                        if let ContentBlock::Text { text } = block {
                            streamed_text.push_str(&text);
                        }
                    }
                }
                Ok(Some(Message::System(_))) => {}
            }
        };

        let result = match outcome {
            Ok(Some(r)) => r,
            Ok(None) => {
                let detail = process
                    .wait_exit_error()
                    .await
                    .unwrap_or_else(|| "stream ended without a result message".to_string());
                process.kill().await;
                return Err(provider_error(detail));
            }
            Err(e) => {
                process.kill().await;
                return Err(e);
            }
        };
        process.kill().await;

        let usage = result.usage().to_token_usage();
        match result {
            ResultMessage::Success(s) if !s.is_error => {
                let content = if s.result.trim().is_empty() {
                    streamed_text
                } else {
                    s.result
                };
                tracing::debug!(
                    input_tokens = usage.input,
                    output_tokens = usage.output,
                    "claude completion finished"
                );
                Ok(Completion {
                    content,
                    usage,
                    latency: started.elapsed(),
                })
            }
            other => Err(provider_error(other.error_text())),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Write an executable stand-in for `claude` that ignores its arguments,
    /// drains stdin, and runs `body`.
    fn fake_claude(dir: &TempDir, body: &str) -> String {
        let path = dir.path().join("fake-claude");
        let script = format!("#!/bin/sh\ncat > /dev/null\n{body}\n");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    const INIT_LINE: &str = r#"{"type":"system","subtype":"init","session_id":"s1","model":"m","tools":[],"mcp_servers":[],"permission_mode":"default","claude_code_version":"0.0.0","cwd":"/tmp"}"#;

    #[tokio::test]
    async fn returns_result_text_and_usage() {
        let dir = TempDir::new().unwrap();
        let result = r#"{"type":"result","subtype":"success","session_id":"s1","result":"generate","duration_ms":1,"is_error":false,"usage":{"input_tokens":40,"output_tokens":2}}"#;
        let exe = fake_claude(&dir, &format!("echo '{INIT_LINE}'\necho '{result}'"));

        let svc = ClaudeCliService::new(exe);
        let completion = svc
            .complete("classify this", &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(completion.content, "generate");
        assert_eq!(completion.usage.input, 40);
        assert_eq!(completion.usage.output, 2);
        assert_eq!(completion.usage.total, 42);
    }

    #[tokio::test]
    async fn skips_unknown_message_types() {
        let dir = TempDir::new().unwrap();
        let unknown = r#"{"type":"rate_limit_event","rate_limit_info":{}}"#;
        let result = r#"{"type":"result","subtype":"success","session_id":"s1","result":"ok","is_error":false,"usage":{"input_tokens":1,"output_tokens":1}}"#;
        let exe = fake_claude(&dir, &format!("echo '{unknown}'\necho '{result}'"));

        let completion = ClaudeCliService::new(exe)
            .complete("p", &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(completion.content, "ok");
    }

    #[tokio::test]
    async fn rate_limited_exit_maps_to_rate_limited() {
        let dir = TempDir::new().unwrap();
        let exe = fake_claude(&dir, "echo 'API Error: 429 rate_limit_error' >&2\nexit 1");

        let err = ClaudeCliService::new(exe)
            .complete("p", &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_rate_limited(), "got {err:?}");
    }

    #[tokio::test]
    async fn other_exit_maps_to_failed_with_stderr() {
        let dir = TempDir::new().unwrap();
        let exe = fake_claude(&dir, "echo 'invalid api key' >&2\nexit 2");

        let err = ClaudeCliService::new(exe)
            .complete("p", &CompletionOptions::default())
            .await
            .unwrap_err();
        match err {
            CompletionError::Failed(msg) => {
                assert!(msg.contains("code 2"), "msg: {msg}");
                assert!(msg.contains("invalid api key"), "msg: {msg}");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_executable_is_an_io_error() {
        let err = ClaudeCliService::new("/definitely/not/here/claude")
            .complete("p", &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Io(_)), "got {err:?}");
    }
}
