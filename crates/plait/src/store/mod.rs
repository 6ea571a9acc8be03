//! Durable session records.
//!
//! Only the keyed collection of [`SessionRecord`] values is persisted; every
//! runtime map is rebuilt empty on application start and re-seeded from these
//! records on restore.

mod db;
mod error;
mod models;
mod repository;

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use models::{SessionRecord, DEFAULT_AGENT_TYPE, DEFAULT_CWD};
pub(crate) use models::sorted_messages;
pub use repository::SessionRecordRepository;
