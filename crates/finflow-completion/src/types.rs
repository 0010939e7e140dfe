use serde::{Deserialize, Serialize};
use std::time::Duration;

// ─── Gateway surface ──────────────────────────────────────────────────────

/// Options for a single completion request.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    /// System prompt override.
    pub system_prompt: Option<String>,
    /// Model name (e.g. `"claude-sonnet-4-6"`). `None` uses the service default.
    pub model: Option<String>,
    /// Maximum agentic turns. Plain completions use 1.
    pub max_turns: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input,
            output,
            total: input + output,
        }
    }
}

/// One finished request/response cycle with the text-generation service.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub usage: TokenUsage,
    pub latency: Duration,
}

// ─── stream-json protocol ─────────────────────────────────────────────────

/// The subset of `claude --output-format stream-json` messages the driver
/// consumes. Unknown `type` values are skipped by the reader.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    System(SystemMessage),
    Assistant(AssistantMessage),
    Result(ResultMessage),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SystemMessage {
    pub session_id: String,
    #[serde(default)]
    pub subtype: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantMessage {
    pub message: AssistantContent,
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantContent {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

/// `type = "result"`: the terminal message. `subtype` distinguishes success
/// from the error conditions.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum ResultMessage {
    Success(ResultSuccess),
    ErrorDuringExecution(ResultError),
    ErrorMaxTurns(ResultError),
    ErrorMaxBudgetUsd(ResultError),
}

impl ResultMessage {
    pub fn is_error(&self) -> bool {
        match self {
            ResultMessage::Success(r) => r.is_error,
            _ => true,
        }
    }

    pub fn usage(&self) -> &ResultUsage {
        match self {
            ResultMessage::Success(r) => &r.usage,
            ResultMessage::ErrorDuringExecution(r)
            | ResultMessage::ErrorMaxTurns(r)
            | ResultMessage::ErrorMaxBudgetUsd(r) => &r.usage,
        }
    }

    /// Human-readable description of a failed result.
    pub fn error_text(&self) -> String {
        match self {
            // A success subtype flagged `is_error` carries the API error in `result`.
            ResultMessage::Success(r) => r.result.clone(),
            ResultMessage::ErrorDuringExecution(r) => join_errors("error during execution", r),
            ResultMessage::ErrorMaxTurns(r) => join_errors("max turns reached", r),
            ResultMessage::ErrorMaxBudgetUsd(r) => join_errors("max budget reached", r),
        }
    }
}

fn join_errors(prefix: &str, r: &ResultError) -> String {
    if r.errors.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}: {}", r.errors.join("; "))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultSuccess {
    pub session_id: String,
    pub result: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub is_error: bool,
    pub usage: ResultUsage,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultError {
    pub session_id: String,
    #[serde(default)]
    pub duration_ms: u64,
    pub usage: ResultUsage,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResultUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: Option<u64>,
    #[serde(default)]
    pub cache_read_input_tokens: Option<u64>,
}

impl ResultUsage {
    /// Cache reads and writes count as input tokens.
    pub fn to_token_usage(&self) -> TokenUsage {
        let input = self.input_tokens
            + self.cache_creation_input_tokens.unwrap_or(0)
            + self.cache_read_input_tokens.unwrap_or(0);
        TokenUsage::new(input, self.output_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Message {
        serde_json::from_str(json).expect("failed to parse message")
    }

    #[test]
    fn parse_result_success() {
        let msg = parse(
            r#"{
                "type": "result",
                "subtype": "success",
                "session_id": "abc-123",
                "result": "generate",
                "duration_ms": 900,
                "is_error": false,
                "num_turns": 1,
                "total_cost_usd": 0.001,
                "usage": {"input_tokens": 120, "output_tokens": 3}
            }"#,
        );
        let Message::Result(result) = msg else {
            panic!("expected Result")
        };
        assert!(!result.is_error());
        assert_eq!(result.usage().to_token_usage(), TokenUsage::new(120, 3));
    }

    #[test]
    fn parse_result_error_carries_errors() {
        let msg = parse(
            r#"{
                "type": "result",
                "subtype": "error_during_execution",
                "session_id": "abc-123",
                "is_error": true,
                "usage": {"input_tokens": 5, "output_tokens": 0},
                "errors": ["API Error: 429 rate_limit_error"]
            }"#,
        );
        let Message::Result(result) = msg else {
            panic!("expected Result")
        };
        assert!(result.is_error());
        assert!(result.error_text().contains("429"));
    }

    #[test]
    fn parse_assistant_ignores_non_text_blocks() {
        let msg = parse(
            r#"{
                "type": "assistant",
                "session_id": "abc-123",
                "parent_tool_use_id": null,
                "message": {
                    "id": "msg_1",
                    "role": "assistant",
                    "content": [
                        {"type": "thinking", "thinking": "hmm"},
                        {"type": "text", "text": "query"}
                    ],
                    "model": "m",
                    "usage": {"input_tokens": 1, "output_tokens": 1}
                }
            }"#,
        );
        let Message::Assistant(asst) = msg else {
            panic!("expected Assistant")
        };
        assert_eq!(asst.message.content.len(), 2);
        assert!(matches!(asst.message.content[0], ContentBlock::Other));
    }

    #[test]
    fn cache_tokens_count_as_input() {
        let usage = ResultUsage {
            input_tokens: 10,
            output_tokens: 4,
            cache_creation_input_tokens: Some(5),
            cache_read_input_tokens: Some(1),
        };
        assert_eq!(usage.to_token_usage(), TokenUsage::new(16, 4));
        assert_eq!(usage.to_token_usage().total, 20);
    }
}
