//! Session record repository.

use sqlx::{Row, SqlitePool};

use crate::session::UserMessage;
use crate::stream::AgentMessage;

use super::error::{StoreError, StoreResult};
use super::models::SessionRecord;

/// Repository for the durable `session_records` collection.
///
/// Message and user-message lists are stored as JSON text columns; the
/// repository owns the encode/decode boundary so callers only ever see
/// [`SessionRecord`].
#[derive(Debug, Clone)]
pub struct SessionRecordRepository {
    pool: SqlitePool,
}

impl SessionRecordRepository {
    /// Create a new repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a record by session id.
    pub async fn get(&self, session_id: &str) -> StoreResult<Option<SessionRecord>> {
        let row = sqlx::query(
            r#"
            SELECT session_id, agent_type, cwd, last_active_at, messages, user_messages
            FROM session_records
            WHERE session_id = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode_row).transpose()
    }

    /// Insert or replace a record.
    pub async fn upsert(&self, record: &SessionRecord) -> StoreResult<()> {
        let messages = serde_json::to_string(&record.messages).map_err(|source| {
            StoreError::Encode {
                session_id: record.session_id.clone(),
                source,
            }
        })?;
        let user_messages =
            serde_json::to_string(&record.user_messages).map_err(|source| StoreError::Encode {
                session_id: record.session_id.clone(),
                source,
            })?;

        sqlx::query(
            r#"
            INSERT INTO session_records (
                session_id, agent_type, cwd, last_active_at, messages, user_messages
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                agent_type = excluded.agent_type,
                cwd = excluded.cwd,
                last_active_at = excluded.last_active_at,
                messages = excluded.messages,
                user_messages = excluded.user_messages
            "#,
        )
        .bind(&record.session_id)
        .bind(&record.agent_type)
        .bind(&record.cwd)
        .bind(&record.last_active_at)
        .bind(&messages)
        .bind(&user_messages)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete a record. Idempotent.
    pub async fn delete(&self, session_id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM session_records WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// List all records, most recently active first.
    pub async fn list(&self) -> StoreResult<Vec<SessionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT session_id, agent_type, cwd, last_active_at, messages, user_messages
            FROM session_records
            ORDER BY last_active_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(decode_row).collect()
    }

    /// Count stored records.
    pub async fn count(&self) -> StoreResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM session_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}

fn decode_row(row: sqlx::sqlite::SqliteRow) -> StoreResult<SessionRecord> {
    let session_id: String = row.get("session_id");

    let messages_json: String = row.get("messages");
    let messages: Vec<AgentMessage> =
        serde_json::from_str(&messages_json).map_err(|source| StoreError::CorruptRecord {
            session_id: session_id.clone(),
            source,
        })?;

    let user_messages_json: String = row.get("user_messages");
    let user_messages: Vec<UserMessage> = serde_json::from_str(&user_messages_json)
        .map_err(|source| StoreError::CorruptRecord {
            session_id: session_id.clone(),
            source,
        })?;

    Ok(SessionRecord {
        session_id,
        agent_type: row.get("agent_type"),
        cwd: row.get("cwd"),
        last_active_at: row.get("last_active_at"),
        messages,
        user_messages,
    })
}
