//! Conversation membership and user-message log.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// A user-authored message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMessage {
    pub content: String,
    /// Unix ms.
    pub sent_at: i64,
    /// Which agent harness the message was addressed to.
    pub agent_type: String,
}

impl UserMessage {
    pub fn new(content: impl Into<String>, agent_type: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sent_at: chrono::Utc::now().timestamp_millis(),
            agent_type: agent_type.into(),
        }
    }
}

/// One logical multi-turn conversation, keyed by its leading process id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Every process id that has carried this conversation, append-only in
    /// spawn order.
    pub process_ids: Vec<String>,
    /// User-authored messages, append-only in send order.
    pub user_messages: Vec<UserMessage>,
}

impl Conversation {
    fn seeded(leading_id: &str) -> Self {
        Self {
            process_ids: vec![leading_id.to_string()],
            user_messages: Vec::new(),
        }
    }
}

/// Tracks which processes and user messages belong to each conversation.
///
/// Entries survive process churn; they are removed only by an explicit
/// session delete.
#[derive(Debug, Default)]
pub struct ConversationRegistry {
    conversations: DashMap<String, Conversation>,
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotently add a process to a conversation.
    pub fn add_process_id(&self, leading_id: &str, new_id: &str) {
        let mut entry = self
            .conversations
            .entry(leading_id.to_string())
            .or_insert_with(|| Conversation::seeded(leading_id));
        if !entry.process_ids.iter().any(|p| p == new_id) {
            entry.process_ids.push(new_id.to_string());
        }
    }

    /// Append a user message. Order is call order.
    pub fn add_user_message(&self, leading_id: &str, message: UserMessage) {
        self.conversations
            .entry(leading_id.to_string())
            .or_insert_with(|| Conversation::seeded(leading_id))
            .user_messages
            .push(message);
    }

    /// Pure read. Unknown conversations come back as a fresh entry containing
    /// only the leading id; nothing is inserted.
    pub fn get(&self, leading_id: &str) -> Conversation {
        self.lookup(leading_id)
            .unwrap_or_else(|| Conversation::seeded(leading_id))
    }

    /// Read without the fresh-entry fallback.
    pub fn lookup(&self, leading_id: &str) -> Option<Conversation> {
        self.conversations.get(leading_id).map(|c| c.clone())
    }

    /// Remove a conversation entirely (session delete).
    pub fn remove(&self, leading_id: &str) {
        self.conversations.remove(leading_id);
    }
}
