//! Process ↔ session id mappings.

use dashmap::DashMap;
use log::debug;

/// Maps process ids to agent-assigned session ids and records which process
/// id is the permanent "leading" one per session.
///
/// Both mappings are write-once: a process keeps its first session id, and a
/// session keeps its first process ("first process wins") for the whole
/// application run, even after that process exits and its runtime state is
/// discarded. The leading process id is the stable key for conversation-level
/// state.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    /// Process id -> session id. Assigned once, immutable thereafter.
    session_by_process: DashMap<String, String>,
    /// Session id -> leading process id. First process wins.
    leading_by_session: DashMap<String, String>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `process_id` belongs to `session_id`.
    ///
    /// The first process seen for a session becomes its leading process;
    /// later assignments for the same session never change that.
    pub fn assign(&self, process_id: &str, session_id: &str) {
        self.session_by_process
            .entry(process_id.to_string())
            .or_insert_with(|| session_id.to_string());

        let leading = self
            .leading_by_session
            .entry(session_id.to_string())
            .or_insert_with(|| process_id.to_string());
        if leading.value() != process_id {
            debug!(
                "session {} already led by process {}, keeping it over {}",
                session_id,
                leading.value(),
                process_id
            );
        }
    }

    /// The session this process belongs to, if assigned.
    pub fn session_for(&self, process_id: &str) -> Option<String> {
        self.session_by_process
            .get(process_id)
            .map(|s| s.value().clone())
    }

    /// The leading process for a session, if the session has been seen this
    /// run.
    pub fn leading_process(&self, session_id: &str) -> Option<String> {
        self.leading_by_session
            .get(session_id)
            .map(|p| p.value().clone())
    }

    /// Drop the process → session mapping for a discarded process.
    ///
    /// The leading-process mapping survives: the conversation key must stay
    /// stable even after its first process is gone.
    pub fn forget_process(&self, process_id: &str) {
        self.session_by_process.remove(process_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_process_wins() {
        let dir = SessionDirectory::new();
        dir.assign("p1", "ses_a");
        dir.assign("p2", "ses_a");

        assert_eq!(dir.leading_process("ses_a").as_deref(), Some("p1"));
        assert_eq!(dir.session_for("p1").as_deref(), Some("ses_a"));
        assert_eq!(dir.session_for("p2").as_deref(), Some("ses_a"));
    }

    #[test]
    fn test_process_session_is_write_once() {
        let dir = SessionDirectory::new();
        dir.assign("p1", "ses_a");
        dir.assign("p1", "ses_b");
        assert_eq!(dir.session_for("p1").as_deref(), Some("ses_a"));
    }

    #[test]
    fn test_forget_process_keeps_leading_mapping() {
        let dir = SessionDirectory::new();
        dir.assign("p1", "ses_a");
        dir.forget_process("p1");

        assert_eq!(dir.session_for("p1"), None);
        assert_eq!(dir.leading_process("ses_a").as_deref(), Some("p1"));
    }

    #[test]
    fn test_unknown_lookups_return_none() {
        let dir = SessionDirectory::new();
        assert_eq!(dir.session_for("nope"), None);
        assert_eq!(dir.leading_process("nope"), None);
    }
}
