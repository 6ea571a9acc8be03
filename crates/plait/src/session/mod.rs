//! Conversation-level runtime state: session identity and membership.
//!
//! A logical conversation outlives any single subprocess. The directory pins
//! each agent-assigned session id to the first process that carried it this
//! run; the registry accumulates which processes and user messages belong to
//! that conversation.

mod directory;
mod registry;

pub use directory::SessionDirectory;
pub use registry::{Conversation, ConversationRegistry, UserMessage};
