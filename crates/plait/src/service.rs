//! Agent stream service - orchestrates decoding, session tracking and
//! persistence.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use chrono::Utc;
use dashmap::DashMap;
use log::{debug, info, warn};
use tokio::sync::watch;

use plait_protocol::{AgentEvent, StreamPayload};

use crate::session::{Conversation, ConversationRegistry, SessionDirectory, UserMessage};
use crate::store::{
    DEFAULT_AGENT_TYPE, DEFAULT_CWD, SessionRecord, SessionRecordRepository, sorted_messages,
};
use crate::stream::{MessageStatus, ProcessState, reduce};

/// Per-process metadata picked up from `session_init`, carried into later
/// automatic persists.
#[derive(Debug, Clone, Default)]
struct ProcessMeta {
    agent_type: Option<String>,
    cwd: Option<String>,
}

/// Central state machine for agent subprocess streams.
///
/// Holds the live per-process state table, the session/conversation maps and
/// the durable repository. All runtime maps start empty on every application
/// run; only [`SessionRecord`]s survive restarts. Clones share all state.
#[derive(Clone)]
pub struct AgentStreamService {
    states: Arc<DashMap<String, ProcessState>>,
    directory: Arc<SessionDirectory>,
    registry: Arc<ConversationRegistry>,
    repo: SessionRecordRepository,
    process_meta: Arc<DashMap<String, ProcessMeta>>,
    ready_rx: watch::Receiver<bool>,
    bridge_attached: Arc<AtomicBool>,
}

impl AgentStreamService {
    /// Create a new service and kick off the asynchronous store warm-up.
    ///
    /// The service is usable immediately; callers that depend on session
    /// lookups should [`wait_ready`](Self::wait_ready) first.
    pub fn new(repo: SessionRecordRepository) -> Self {
        let (ready_tx, ready_rx) = watch::channel(false);

        let probe = repo.clone();
        tokio::spawn(async move {
            match probe.count().await.context("failed to probe session store") {
                Ok(stored) => info!("session store ready ({stored} stored sessions)"),
                Err(e) => warn!("session store warm-up failed: {e:#}"),
            }
            let _ = ready_tx.send(true);
        });

        Self {
            states: Arc::new(DashMap::new()),
            directory: Arc::new(SessionDirectory::new()),
            registry: Arc::new(ConversationRegistry::new()),
            repo,
            process_meta: Arc::new(DashMap::new()),
            ready_rx,
            bridge_attached: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Resolves once the store warm-up has completed.
    pub async fn wait_ready(&self) {
        let mut rx = self.ready_rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    // ========================================================================
    // Event dispatch
    // ========================================================================

    /// Dispatch one inbound event.
    ///
    /// Reduction happens synchronously; persistence triggered by completion
    /// events runs as a fire-and-forget task whose failure is logged and
    /// retried naturally by the next completion.
    pub fn handle_event(&self, event: AgentEvent) {
        if let StreamPayload::SessionInit {
            session_id,
            agent_type,
            cwd,
        } = &event.payload
        {
            self.register_session(&event.process_id, session_id, agent_type, cwd);
            return;
        }

        self.apply(&event.process_id, &event.payload);

        if event.payload.is_completion() {
            self.spawn_persist(&event.process_id);
        }
    }

    fn register_session(
        &self,
        process_id: &str,
        session_id: &str,
        agent_type: &Option<String>,
        cwd: &Option<String>,
    ) {
        self.directory.assign(process_id, session_id);
        let leading = self
            .directory
            .leading_process(session_id)
            .unwrap_or_else(|| process_id.to_string());
        self.registry.add_process_id(&leading, process_id);

        let mut meta = self.process_meta.entry(process_id.to_string()).or_default();
        if agent_type.is_some() {
            meta.agent_type = agent_type.clone();
        }
        if cwd.is_some() {
            meta.cwd = cwd.clone();
        }

        debug!("process {process_id} joined session {session_id} (leading {leading})");
    }

    /// Run one reduction while holding the process's state entry.
    fn apply(&self, process_id: &str, payload: &StreamPayload) {
        let mut entry = self.states.entry(process_id.to_string()).or_default();
        let state = std::mem::take(entry.value_mut());
        *entry.value_mut() = reduce(state, payload);
    }

    fn spawn_persist(&self, process_id: &str) {
        let service = self.clone();
        let process_id = process_id.to_string();
        tokio::spawn(async move {
            let meta = service
                .process_meta
                .get(&process_id)
                .map(|m| m.clone())
                .unwrap_or_default();
            if let Err(e) = service
                .persist(&process_id, meta.agent_type.as_deref(), meta.cwd.as_deref())
                .await
            {
                warn!("persist for process {process_id} failed: {e:#}");
            }
        });
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Merge live state for every process of this conversation with the
    /// previously stored record and write the result back.
    ///
    /// No-op when the process has no assigned session. Idempotent: repeated
    /// calls without new events produce the same record apart from
    /// `last_active_at`. Messages already stored survive even when their
    /// owning process's runtime state has been discarded.
    pub async fn persist(
        &self,
        process_id: &str,
        agent_type: Option<&str>,
        cwd: Option<&str>,
    ) -> Result<()> {
        let Some(session_id) = self.directory.session_for(process_id) else {
            debug!("persist skipped: process {process_id} has no session");
            return Ok(());
        };

        let leading = self
            .directory
            .leading_process(&session_id)
            .unwrap_or_else(|| process_id.to_string());
        let conversation = self.registry.lookup(&leading);

        let process_ids = conversation
            .as_ref()
            .map(|c| c.process_ids.clone())
            .unwrap_or_else(|| vec![process_id.to_string()]);
        let user_messages = conversation.map(|c| c.user_messages).unwrap_or_default();

        let previous = self
            .repo
            .get(&session_id)
            .await
            .with_context(|| format!("failed to load previous record for session {session_id}"))?;

        let mut by_id = previous
            .as_ref()
            .map(SessionRecord::message_map)
            .unwrap_or_default();

        // Live state wins over stored history for any shared message id.
        for pid in &process_ids {
            if let Some(state) = self.states.get(pid) {
                for message in &state.messages {
                    if message.status != MessageStatus::Streaming {
                        by_id.insert(message.id.clone(), message.clone());
                    }
                }
            }
        }

        let record = SessionRecord {
            session_id: session_id.clone(),
            agent_type: agent_type
                .map(str::to_string)
                .or_else(|| previous.as_ref().map(|p| p.agent_type.clone()))
                .unwrap_or_else(|| DEFAULT_AGENT_TYPE.to_string()),
            cwd: cwd
                .map(str::to_string)
                .or_else(|| previous.as_ref().map(|p| p.cwd.clone()))
                .unwrap_or_else(|| DEFAULT_CWD.to_string()),
            messages: sorted_messages(by_id),
            user_messages,
            last_active_at: Utc::now().to_rfc3339(),
        };

        self.repo
            .upsert(&record)
            .await
            .with_context(|| format!("failed to write record for session {session_id}"))?;

        debug!(
            "persisted session {session_id}: {} messages, {} user messages",
            record.messages.len(),
            record.user_messages.len()
        );
        Ok(())
    }

    /// Rehydrate a stored session onto a freshly spawned process.
    ///
    /// The restored state carries the persisted messages, no in-flight
    /// message, and is marked inactive/exited. Persisted user messages are
    /// appended after any already present at runtime; calling this twice for
    /// the same session duplicates them, so callers restore each session at
    /// most once per run.
    pub async fn restore_session_to_process(
        &self,
        process_id: &str,
        session_id: &str,
    ) -> Result<()> {
        let Some(record) = self
            .repo
            .get(session_id)
            .await
            .with_context(|| format!("failed to load record for session {session_id}"))?
        else {
            warn!("restore skipped: no stored record for session {session_id}");
            return Ok(());
        };

        self.directory.assign(process_id, session_id);
        let leading = self
            .directory
            .leading_process(session_id)
            .unwrap_or_else(|| process_id.to_string());
        self.registry.add_process_id(&leading, process_id);

        self.states
            .insert(process_id.to_string(), record.to_process_state());
        self.process_meta.insert(
            process_id.to_string(),
            ProcessMeta {
                agent_type: Some(record.agent_type.clone()),
                cwd: Some(record.cwd.clone()),
            },
        );

        for message in record.user_messages {
            self.registry.add_user_message(&leading, message);
        }

        info!(
            "restored session {session_id} onto process {process_id} ({} messages)",
            record.messages.len()
        );
        Ok(())
    }

    /// Drop a process's runtime state and its process → session mapping.
    ///
    /// The durable record and the session's leading-process mapping are
    /// untouched, so a later process can pick the conversation back up.
    pub fn discard_process(&self, process_id: &str) {
        self.states.remove(process_id);
        self.process_meta.remove(process_id);
        self.directory.forget_process(process_id);
        debug!("discarded runtime state for process {process_id}");
    }

    /// Delete a session's durable record and conversation entry.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.repo
            .delete(session_id)
            .await
            .with_context(|| format!("failed to delete record for session {session_id}"))?;
        if let Some(leading) = self.directory.leading_process(session_id) {
            self.registry.remove(&leading);
        }
        info!("deleted session {session_id}");
        Ok(())
    }

    // ========================================================================
    // Query surface
    // ========================================================================

    /// Snapshot of a process's state.
    pub fn state(&self, process_id: &str) -> Option<ProcessState> {
        self.states.get(process_id).map(|s| s.clone())
    }

    /// Whether the process has finished its current turn. Unknown processes
    /// count as complete.
    pub fn is_complete(&self, process_id: &str) -> bool {
        self.states
            .get(process_id)
            .map(|s| s.is_complete())
            .unwrap_or(true)
    }

    /// The session a process belongs to, if any.
    pub fn session_for(&self, process_id: &str) -> Option<String> {
        self.directory.session_for(process_id)
    }

    /// Conversation snapshot for a leading process id.
    pub fn conversation(&self, leading_id: &str) -> Conversation {
        self.registry.get(leading_id)
    }

    /// Append a user message to a conversation.
    pub fn add_user_message(&self, leading_id: &str, message: UserMessage) {
        self.registry.add_user_message(leading_id, message);
    }

    /// Flag that the process is waiting for an agent response.
    pub fn set_waiting_for_response(&self, process_id: &str, waiting: bool) {
        if let Some(mut state) = self.states.get_mut(process_id) {
            state.is_waiting_for_response = waiting;
        }
    }

    /// Flag that the agent has asked the user a question.
    pub fn set_waiting_for_question(&self, process_id: &str, waiting: bool) {
        if let Some(mut state) = self.states.get_mut(process_id) {
            state.is_waiting_for_question = waiting;
        }
    }

    /// Claim the single transport subscription slot. Returns `false` when a
    /// bridge is already attached.
    pub(crate) fn claim_bridge(&self) -> bool {
        self.bridge_attached
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}
