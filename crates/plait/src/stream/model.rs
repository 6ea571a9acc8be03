//! Runtime message state for one agent subprocess.
//!
//! These are the transient, in-memory shapes the decoder rewrites on every
//! event. The durable counterpart lives in `crate::store` with an explicit
//! mapping between the two; nothing here is written to storage directly.

use serde::{Deserialize, Serialize};

use plait_protocol::{StopReason, TokenUsage};

// ============================================================================
// Content blocks
// ============================================================================

/// One contiguous unit of a message's output.
///
/// `content` and `tool_input` only ever grow by append; the decoder never
/// truncates or replaces accumulated text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain assistant text.
    Text { content: String, is_complete: bool },

    /// Chain-of-thought / reasoning text.
    Thinking { content: String, is_complete: bool },

    /// A tool invocation. `tool_input` holds raw JSON fragments exactly as
    /// the model emitted them; consumers parse, the decoder only accumulates.
    ToolUse {
        tool_id: String,
        tool_name: String,
        tool_input: String,
        is_complete: bool,
    },
}

impl ContentBlock {
    /// Create a text block seeded with an initial delta.
    pub fn text(seed: impl Into<String>) -> Self {
        Self::Text {
            content: seed.into(),
            is_complete: false,
        }
    }

    /// Create a thinking block seeded with an initial delta.
    pub fn thinking(seed: impl Into<String>) -> Self {
        Self::Thinking {
            content: seed.into(),
            is_complete: false,
        }
    }

    /// Create a tool-use block with empty accumulated input.
    pub fn tool_use(tool_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self::ToolUse {
            tool_id: tool_id.into(),
            tool_name: tool_name.into(),
            tool_input: String::new(),
            is_complete: false,
        }
    }

    /// Append a text delta. Tool blocks have no text content to grow, so the
    /// delta is dropped for them.
    pub fn append_text(&mut self, delta: &str) {
        match self {
            Self::Text { content, .. } | Self::Thinking { content, .. } => {
                content.push_str(delta);
            }
            Self::ToolUse { .. } => {}
        }
    }

    /// Append a raw tool-input fragment. No-op for non-tool blocks.
    pub fn append_tool_input(&mut self, fragment: &str) {
        if let Self::ToolUse { tool_input, .. } = self {
            tool_input.push_str(fragment);
        }
    }

    /// Mark this block complete.
    pub fn mark_complete(&mut self) {
        match self {
            Self::Text { is_complete, .. }
            | Self::Thinking { is_complete, .. }
            | Self::ToolUse { is_complete, .. } => *is_complete = true,
        }
    }

    /// The tool call id, for tool-use blocks.
    pub fn tool_id(&self) -> Option<&str> {
        match self {
            Self::ToolUse { tool_id, .. } => Some(tool_id),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        match self {
            Self::Text { is_complete, .. }
            | Self::Thinking { is_complete, .. }
            | Self::ToolUse { is_complete, .. } => *is_complete,
        }
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Lifecycle of one agent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Still receiving deltas.
    Streaming,
    /// Finished normally.
    Completed,
    /// Finalized by an agent runtime error.
    Error,
    /// Pre-empted by a new message-start before it finished.
    Aborted,
}

/// One reconstructed agent message.
///
/// Immutable once `status` leaves `Streaming`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Message id as assigned by the agent runtime.
    pub id: String,
    /// Model that produced this message.
    pub model: String,
    /// Ordered content blocks.
    pub blocks: Vec<ContentBlock>,
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Unix ms.
    pub started_at: i64,
    /// Unix ms, set when the message leaves `Streaming`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

impl AgentMessage {
    /// Begin a new in-flight message.
    pub fn streaming(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            blocks: Vec::new(),
            status: MessageStatus::Streaming,
            stop_reason: None,
            usage: None,
            started_at: chrono::Utc::now().timestamp_millis(),
            completed_at: None,
        }
    }

    /// Close out the message: every block marked complete, status and
    /// completion timestamp set.
    pub fn finalize(
        mut self,
        status: MessageStatus,
        stop_reason: Option<StopReason>,
        usage: Option<TokenUsage>,
    ) -> Self {
        for block in &mut self.blocks {
            block.mark_complete();
        }
        self.status = status;
        if stop_reason.is_some() {
            self.stop_reason = stop_reason;
        }
        if usage.is_some() {
            self.usage = usage;
        }
        self.completed_at = Some(chrono::Utc::now().timestamp_millis());
        self
    }

    pub fn is_streaming(&self) -> bool {
        self.status == MessageStatus::Streaming
    }
}

// ============================================================================
// Per-process state
// ============================================================================

/// Accumulated runtime state for one agent subprocess, keyed by process id.
///
/// Created lazily on the first event for a process and removed only by an
/// explicit discard from the owning caller. A non-None `current_message`
/// implies the process has not exited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessState {
    /// At most one in-flight message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_message: Option<AgentMessage>,
    /// Finalized messages, appended in completion order.
    pub messages: Vec<AgentMessage>,
    /// Whether the agent is currently working on this process.
    pub is_active: bool,
    /// Host sent input and no response has started yet.
    pub is_waiting_for_response: bool,
    /// Agent asked the user a question and is blocked on the answer.
    pub is_waiting_for_question: bool,
    pub process_exited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Last process-level error as a combined "type: message" string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessState {
    /// True when no message is in flight.
    pub fn is_complete(&self) -> bool {
        self.current_message.is_none()
    }
}
