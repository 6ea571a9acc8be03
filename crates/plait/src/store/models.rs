//! The serializable session record and its mapping to runtime state.
//!
//! `SessionRecord` is deliberately a separate type from the transient
//! `ProcessState`: the record carries only what survives a restart, and the
//! two convert through explicit functions instead of a serialization
//! allow-list on one mixed structure.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::session::UserMessage;
use crate::stream::{AgentMessage, ProcessState};

/// Sentinel agent type for records persisted before the harness identified
/// itself.
pub const DEFAULT_AGENT_TYPE: &str = "unknown";

/// Sentinel working directory.
pub const DEFAULT_CWD: &str = ".";

/// The canonical durable record for one agent session.
///
/// Message ids are unique within a record and the list is sorted ascending by
/// `started_at`; re-deriving the record from the same inputs is
/// deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub agent_type: String,
    /// Finalized messages across every process of the conversation.
    pub messages: Vec<AgentMessage>,
    /// User-authored messages in send order.
    pub user_messages: Vec<UserMessage>,
    /// RFC 3339.
    pub last_active_at: String,
    pub cwd: String,
}

impl SessionRecord {
    /// Seed map for merge-on-persist: id → message from this record.
    pub fn message_map(&self) -> HashMap<String, AgentMessage> {
        self.messages
            .iter()
            .map(|m| (m.id.clone(), m.clone()))
            .collect()
    }

    /// Hydrate a fresh per-process runtime state from this record.
    ///
    /// The restored state represents a process that is not running: full
    /// message history, nothing in flight, inactive, exited.
    pub fn to_process_state(&self) -> ProcessState {
        ProcessState {
            current_message: None,
            messages: self.messages.clone(),
            is_active: false,
            is_waiting_for_response: false,
            is_waiting_for_question: false,
            process_exited: true,
            exit_code: None,
            error: None,
        }
    }
}

/// Deterministic final ordering for a merged message map: ascending by
/// `started_at`, message id as the tiebreak so equal timestamps cannot
/// reorder between runs.
pub(crate) fn sorted_messages(map: HashMap<String, AgentMessage>) -> Vec<AgentMessage> {
    let mut messages: Vec<AgentMessage> = map.into_values().collect();
    messages.sort_by(|a, b| {
        a.started_at
            .cmp(&b.started_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MessageStatus;

    fn message(id: &str, started_at: i64) -> AgentMessage {
        AgentMessage {
            id: id.to_string(),
            model: "sonnet".to_string(),
            blocks: Vec::new(),
            status: MessageStatus::Completed,
            stop_reason: None,
            usage: None,
            started_at,
            completed_at: Some(started_at + 1),
        }
    }

    fn record(messages: Vec<AgentMessage>) -> SessionRecord {
        SessionRecord {
            session_id: "ses_a".to_string(),
            agent_type: "claude".to_string(),
            messages,
            user_messages: vec![UserMessage::new("hi", "claude")],
            last_active_at: "2026-01-01T00:00:00Z".to_string(),
            cwd: "/work".to_string(),
        }
    }

    #[test]
    fn test_sorted_messages_orders_by_start_time() {
        let mut map = HashMap::new();
        map.insert("m2".to_string(), message("m2", 200));
        map.insert("m1".to_string(), message("m1", 100));
        map.insert("m3".to_string(), message("m3", 150));

        let sorted = sorted_messages(map);
        let ids: Vec<&str> = sorted.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m3", "m2"]);
    }

    #[test]
    fn test_sorted_messages_tiebreak_is_stable() {
        let mut map = HashMap::new();
        map.insert("b".to_string(), message("b", 100));
        map.insert("a".to_string(), message("a", 100));

        let sorted = sorted_messages(map);
        assert_eq!(sorted[0].id, "a");
        assert_eq!(sorted[1].id, "b");
    }

    #[test]
    fn test_to_process_state_marks_exited() {
        let state = record(vec![message("m1", 100)]).to_process_state();
        assert!(state.process_exited);
        assert!(!state.is_active);
        assert!(state.current_message.is_none());
        assert_eq!(state.messages.len(), 1);
    }

    #[test]
    fn test_message_map_round_trip() {
        let rec = record(vec![message("m1", 100), message("m2", 200)]);
        let map = rec.message_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["m1"].started_at, 100);
    }

    #[test]
    fn test_record_json_round_trip() {
        let rec = record(vec![message("m1", 100)]);
        let json = serde_json::to_string(&rec).unwrap();
        let back: SessionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
    }
}
