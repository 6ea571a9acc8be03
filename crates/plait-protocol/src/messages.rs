//! Shared message-level types carried on stream events.

use serde::{Deserialize, Serialize};

/// Why the model stopped emitting a message.
///
/// Agent runtimes report this with slightly different spellings; unrecognized
/// values are preserved verbatim in `Other` rather than dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    Refusal,
    #[serde(untagged)]
    Other(String),
}

impl StopReason {
    /// Parse from an agent-reported stop reason string.
    pub fn parse(s: &str) -> Self {
        match s {
            "end_turn" => Self::EndTurn,
            "tool_use" => Self::ToolUse,
            "max_tokens" => Self::MaxTokens,
            "stop_sequence" => Self::StopSequence,
            "refusal" => Self::Refusal,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether the agent will keep going after this message.
    ///
    /// A `tool_use` stop means the message ended only to run tools; the agent
    /// turn is not over and more messages will follow on the same process.
    pub fn will_continue(&self) -> bool {
        matches!(self, Self::ToolUse)
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EndTurn => write!(f, "end_turn"),
            Self::ToolUse => write!(f, "tool_use"),
            Self::MaxTokens => write!(f, "max_tokens"),
            Self::StopSequence => write!(f, "stop_sequence"),
            Self::Refusal => write!(f, "refusal"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Token usage statistics reported at message end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<i64>,
    /// Output tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<i64>,
    /// Cache read tokens.
    #[serde(rename = "cacheRead", default, skip_serializing_if = "Option::is_none")]
    pub cache_read: Option<i64>,
    /// Cache write tokens.
    #[serde(
        rename = "cacheWrite",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cache_write: Option<i64>,
}

impl TokenUsage {
    /// Total tokens (input + output).
    pub fn total(&self) -> i64 {
        self.input.unwrap_or(0) + self.output.unwrap_or(0)
    }
}
