//! Pure stream decoder: (state, event) -> state.
//!
//! The reduction is total and never panics. Events that don't apply to the
//! current state (deltas with no in-flight message, indexes out of range,
//! unrecognized kinds) are no-ops rather than errors: subprocess streams get
//! truncated and reordered in the wild and the decoder's contract is to keep
//! whatever state it can.

use plait_protocol::{StopReason, StreamPayload};

use super::model::{AgentMessage, ContentBlock, MessageStatus, ProcessState};

/// Apply one semantic event to a process's state, producing the next state.
pub fn reduce(mut state: ProcessState, payload: &StreamPayload) -> ProcessState {
    match payload {
        StreamPayload::MessageStart { message_id, model } => {
            // A message-start over an unfinished message is an "abandon and
            // restart turn" signal; the abandoned message is kept in history
            // with a distinct status instead of being silently dropped.
            if let Some(abandoned) = state.current_message.take() {
                state
                    .messages
                    .push(abandoned.finalize(MessageStatus::Aborted, None, None));
            }
            state.current_message = Some(AgentMessage::streaming(message_id, model));
            state.is_active = true;
            state.is_waiting_for_response = false;
            state.error = None;
        }

        StreamPayload::TextDelta { delta, block_index } => {
            append_delta(&mut state, *block_index, delta, BlockKind::Text);
        }

        StreamPayload::ThinkingDelta { delta, block_index } => {
            append_delta(&mut state, *block_index, delta, BlockKind::Thinking);
        }

        StreamPayload::ToolStart {
            tool_id, tool_name, ..
        } => {
            if let Some(current) = state.current_message.as_mut() {
                // Some harnesses re-announce a tool on reconnect; dedupe by id.
                let already_known = current
                    .blocks
                    .iter()
                    .any(|b| b.tool_id() == Some(tool_id.as_str()));
                if !already_known {
                    current.blocks.push(ContentBlock::tool_use(tool_id, tool_name));
                }
            }
        }

        StreamPayload::ToolInputDelta {
            partial_json,
            block_index,
        } => {
            if let Some(current) = state.current_message.as_mut() {
                if let Some(block) = current.blocks.get_mut(*block_index) {
                    block.append_tool_input(partial_json);
                }
            }
        }

        // Two upstream spellings of the same semantic event.
        StreamPayload::ToolEnd { block_index } | StreamPayload::BlockEnd { block_index } => {
            if let Some(current) = state.current_message.as_mut() {
                if let Some(block) = current.blocks.get_mut(*block_index) {
                    block.mark_complete();
                }
            }
        }

        StreamPayload::MessageEnd { stop_reason, usage } => {
            if let Some(current) = state.current_message.take() {
                state.messages.push(current.finalize(
                    MessageStatus::Completed,
                    stop_reason.clone(),
                    usage.clone(),
                ));
            }
            // Applied even without an in-flight message so duplicate end
            // events still settle activity correctly.
            state.is_active = stop_reason
                .as_ref()
                .is_some_and(StopReason::will_continue);
        }

        StreamPayload::Error {
            error_type,
            message,
        } => {
            if let Some(current) = state.current_message.take() {
                state
                    .messages
                    .push(current.finalize(MessageStatus::Error, None, None));
            }
            state.error = Some(format!("{error_type}: {message}"));
            state.is_active = false;
        }

        StreamPayload::ProcessExit { exit_code } => {
            if let Some(current) = state.current_message.take() {
                state.messages.push(current.finalize(
                    MessageStatus::Completed,
                    Some(StopReason::Other("process_exit".to_string())),
                    None,
                ));
            }
            state.process_exited = true;
            state.exit_code = *exit_code;
            state.is_active = false;
        }

        // Routed by the service, not the decoder.
        StreamPayload::SessionInit { .. } => {}

        StreamPayload::Unknown => {}
    }

    state
}

enum BlockKind {
    Text,
    Thinking,
}

/// Append a delta at `block_index`, growing the block list by one when the
/// index points at or past the tail. Index jumps beyond the current count are
/// treated the same as an exact append; upstream renumbering should never
/// cost content.
fn append_delta(state: &mut ProcessState, block_index: usize, delta: &str, kind: BlockKind) {
    let Some(current) = state.current_message.as_mut() else {
        return;
    };

    if block_index >= current.blocks.len() {
        let block = match kind {
            BlockKind::Text => ContentBlock::text(delta),
            BlockKind::Thinking => ContentBlock::thinking(delta),
        };
        current.blocks.push(block);
    } else {
        current.blocks[block_index].append_text(delta);
    }
}
