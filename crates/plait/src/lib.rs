//! Plait core library.
//!
//! Ingests the semantic event stream emitted by agent subprocesses, rebuilds
//! structured per-process message state, tracks logical conversations across
//! subprocess respawns, and persists session records to SQLite with
//! crash-tolerant merge semantics.

pub mod service;
pub mod session;
pub mod store;
pub mod stream;
pub mod transport;

pub use service::AgentStreamService;
pub use session::{Conversation, ConversationRegistry, SessionDirectory, UserMessage};
pub use store::{Database, SessionRecord, SessionRecordRepository};
pub use stream::{AgentMessage, ContentBlock, MessageStatus, ProcessState};
pub use transport::{BridgeHandle, StreamBridge};
