//! Semantic stream events emitted by agent subprocesses.
//!
//! Events arrive in emission order per process; events from different
//! processes may interleave. The stream decoder derives all message state
//! from this vocabulary alone, so transport adapters must translate their
//! native notifications into these shapes and nothing else.

use serde::{Deserialize, Serialize};

use crate::messages::{StopReason, TokenUsage};

// ============================================================================
// Event envelope
// ============================================================================

/// A semantic event with routing metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    /// Which subprocess produced this event.
    pub process_id: String,

    /// Unix ms timestamp.
    pub ts: i64,

    /// The event payload.
    #[serde(flatten)]
    pub payload: StreamPayload,
}

// ============================================================================
// Event payloads
// ============================================================================

/// All possible event types, tagged by `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamPayload {
    /// New assistant message started.
    MessageStart { message_id: String, model: String },

    /// Text content delta for the block at `block_index`.
    TextDelta { delta: String, block_index: usize },

    /// Thinking content delta for the block at `block_index`.
    ThinkingDelta { delta: String, block_index: usize },

    /// Tool invocation being assembled by the model.
    ToolStart {
        tool_id: String,
        tool_name: String,
        block_index: usize,
    },

    /// Raw tool-input JSON fragment. Fragments are accumulated, never parsed
    /// here.
    ToolInputDelta {
        partial_json: String,
        block_index: usize,
    },

    /// Tool block complete. Same meaning as `BlockEnd`; some harnesses report
    /// tool completion separately from generic block completion.
    ToolEnd { block_index: usize },

    /// Content block complete.
    BlockEnd { block_index: usize },

    /// Message complete.
    MessageEnd {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_reason: Option<StopReason>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<TokenUsage>,
    },

    /// Agent runtime error.
    Error { error_type: String, message: String },

    /// The agent runtime assigned its own session id to this process.
    SessionInit {
        session_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cwd: Option<String>,
    },

    /// The subprocess exited. Authoritative completion for anything still in
    /// flight.
    ProcessExit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
    },

    /// Forward-compatibility: unrecognized event kinds decode to this and are
    /// ignored by the core.
    #[serde(other)]
    Unknown,
}

impl StreamPayload {
    /// Whether this event finalizes a message or a process and should trigger
    /// a durable persist for its process.
    pub fn is_completion(&self) -> bool {
        matches!(
            self,
            Self::MessageEnd { .. } | Self::Error { .. } | Self::ProcessExit { .. }
        )
    }
}
