//! End-to-end tests: bridge -> decoder -> merge-on-persist -> restore.

use std::time::Duration;

use tokio::sync::mpsc;

use plait::store::{Database, SessionRecordRepository};
use plait::{AgentStreamService, MessageStatus, StreamBridge, UserMessage};
use plait_protocol::{AgentEvent, StopReason, StreamPayload, TokenUsage};

async fn service() -> (AgentStreamService, SessionRecordRepository) {
    let _ = env_logger::builder().is_test(true).try_init();
    let db = Database::in_memory().await.unwrap();
    let repo = SessionRecordRepository::new(db.pool().clone());
    let svc = AgentStreamService::new(repo.clone());
    svc.wait_ready().await;
    (svc, repo)
}

fn event(process_id: &str, ts: i64, payload: StreamPayload) -> AgentEvent {
    AgentEvent {
        process_id: process_id.to_string(),
        ts,
        payload,
    }
}

/// Wait for a fire-and-forget persist to land.
async fn wait_for_record(repo: &SessionRecordRepository, session_id: &str) -> plait::SessionRecord {
    for _ in 0..100 {
        if let Some(record) = repo.get(session_id).await.unwrap() {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no record persisted for session {session_id}");
}

#[tokio::test]
async fn full_turn_through_the_bridge() {
    let (svc, repo) = service().await;
    let (tx, rx) = mpsc::channel(32);
    let handle = StreamBridge::attach(svc.clone(), rx).unwrap();

    let events = vec![
        StreamPayload::SessionInit {
            session_id: "ses_a".to_string(),
            agent_type: Some("claude".to_string()),
            cwd: Some("/work".to_string()),
        },
        StreamPayload::MessageStart {
            message_id: "m1".to_string(),
            model: "sonnet".to_string(),
        },
        StreamPayload::ThinkingDelta {
            delta: "let me think".to_string(),
            block_index: 0,
        },
        StreamPayload::BlockEnd { block_index: 0 },
        StreamPayload::TextDelta {
            delta: "Hello ".to_string(),
            block_index: 1,
        },
        StreamPayload::TextDelta {
            delta: "world".to_string(),
            block_index: 1,
        },
        StreamPayload::ToolStart {
            tool_id: "t1".to_string(),
            tool_name: "read_file".to_string(),
            block_index: 2,
        },
        StreamPayload::ToolInputDelta {
            partial_json: "{\"path\":".to_string(),
            block_index: 2,
        },
        StreamPayload::ToolInputDelta {
            partial_json: "\"a.rs\"}".to_string(),
            block_index: 2,
        },
        StreamPayload::ToolEnd { block_index: 2 },
        StreamPayload::MessageEnd {
            stop_reason: Some(StopReason::EndTurn),
            usage: Some(TokenUsage {
                input: Some(10),
                output: Some(20),
                cache_read: None,
                cache_write: None,
            }),
        },
    ];
    for (i, payload) in events.into_iter().enumerate() {
        tx.send(event("p1", i as i64, payload)).await.unwrap();
    }
    drop(tx);
    handle.shutdown().await;

    let state = svc.state("p1").unwrap();
    assert!(state.current_message.is_none());
    assert!(!state.is_active);
    assert_eq!(state.messages.len(), 1);

    let message = &state.messages[0];
    assert_eq!(message.id, "m1");
    assert_eq!(message.status, MessageStatus::Completed);
    assert_eq!(message.stop_reason, Some(StopReason::EndTurn));
    assert_eq!(message.blocks.len(), 3);
    assert!(message.blocks.iter().all(|b| b.is_complete()));

    // message_end is a completion event, so the session was persisted.
    let record = wait_for_record(&repo, "ses_a").await;
    assert_eq!(record.agent_type, "claude");
    assert_eq!(record.cwd, "/work");
    assert_eq!(record.messages.len(), 1);
    assert_eq!(record.messages[0].id, "m1");
}

#[tokio::test]
async fn resumed_process_merges_into_one_session() {
    let (svc, repo) = service().await;

    let turn = |process_id: &str, message_id: &str| {
        vec![
            event(
                process_id,
                0,
                StreamPayload::MessageStart {
                    message_id: message_id.to_string(),
                    model: "sonnet".to_string(),
                },
            ),
            event(
                process_id,
                1,
                StreamPayload::TextDelta {
                    delta: "done".to_string(),
                    block_index: 0,
                },
            ),
            event(
                process_id,
                2,
                StreamPayload::MessageEnd {
                    stop_reason: Some(StopReason::EndTurn),
                    usage: None,
                },
            ),
        ]
    };

    // First process carries the first turn.
    svc.handle_event(event(
        "pa",
        0,
        StreamPayload::SessionInit {
            session_id: "ses_a".to_string(),
            agent_type: Some("claude".to_string()),
            cwd: None,
        },
    ));
    for ev in turn("pa", "m1") {
        svc.handle_event(ev);
    }
    svc.persist("pa", Some("claude"), None).await.unwrap();

    // The app drops process A entirely, then resumes the session as B.
    svc.discard_process("pa");
    svc.handle_event(event(
        "pb",
        0,
        StreamPayload::SessionInit {
            session_id: "ses_a".to_string(),
            agent_type: Some("claude".to_string()),
            cwd: None,
        },
    ));
    for ev in turn("pb", "m2") {
        svc.handle_event(ev);
    }
    svc.persist("pb", None, None).await.unwrap();

    let record = repo.get("ses_a").await.unwrap().unwrap();
    let ids: Vec<&str> = record.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m2"]);
    assert_eq!(record.agent_type, "claude");

    // A's runtime state is gone but both processes map to one conversation.
    let conv = svc.conversation("pa");
    assert_eq!(conv.process_ids, vec!["pa", "pb"]);
}

#[tokio::test]
async fn restart_restores_the_conversation() {
    let (svc, repo) = service().await;

    svc.handle_event(event(
        "p1",
        0,
        StreamPayload::SessionInit {
            session_id: "ses_a".to_string(),
            agent_type: Some("claude".to_string()),
            cwd: Some("/work".to_string()),
        },
    ));
    svc.add_user_message("p1", UserMessage::new("fix the bug", "claude"));
    svc.handle_event(event(
        "p1",
        1,
        StreamPayload::MessageStart {
            message_id: "m1".to_string(),
            model: "sonnet".to_string(),
        },
    ));
    svc.handle_event(event(
        "p1",
        2,
        StreamPayload::TextDelta {
            delta: "fixed".to_string(),
            block_index: 0,
        },
    ));
    svc.handle_event(event(
        "p1",
        3,
        StreamPayload::ProcessExit { exit_code: Some(0) },
    ));
    svc.persist("p1", Some("claude"), Some("/work")).await.unwrap();
    let stored = repo.get("ses_a").await.unwrap().unwrap();

    // Simulated restart: new service over the same database.
    let restarted = AgentStreamService::new(repo.clone());
    restarted.wait_ready().await;
    assert!(restarted.state("p1").is_none());

    restarted
        .restore_session_to_process("p2", "ses_a")
        .await
        .unwrap();

    let state = restarted.state("p2").unwrap();
    assert_eq!(state.messages, stored.messages);
    assert!(state.process_exited);
    assert!(restarted.is_complete("p2"));

    let conv = restarted.conversation("p2");
    assert_eq!(conv.user_messages.len(), 1);
    assert_eq!(conv.user_messages[0].content, "fix the bug");

    // Persisting from the restored process keeps the history intact.
    restarted.persist("p2", None, None).await.unwrap();
    let record = repo.get("ses_a").await.unwrap().unwrap();
    assert_eq!(record.messages, stored.messages);
    assert_eq!(record.agent_type, "claude");
    assert_eq!(record.cwd, "/work");
}

#[tokio::test]
async fn stream_error_is_surfaced_and_persisted() {
    let (svc, repo) = service().await;

    svc.handle_event(event(
        "p1",
        0,
        StreamPayload::SessionInit {
            session_id: "ses_a".to_string(),
            agent_type: None,
            cwd: None,
        },
    ));
    svc.handle_event(event(
        "p1",
        1,
        StreamPayload::MessageStart {
            message_id: "m1".to_string(),
            model: "sonnet".to_string(),
        },
    ));
    svc.handle_event(event(
        "p1",
        2,
        StreamPayload::Error {
            error_type: "overloaded_error".to_string(),
            message: "try again later".to_string(),
        },
    ));

    let state = svc.state("p1").unwrap();
    assert!(!state.is_active);
    assert_eq!(
        state.error.as_deref(),
        Some("overloaded_error: try again later")
    );
    assert_eq!(state.messages[0].status, MessageStatus::Error);

    let record = wait_for_record(&repo, "ses_a").await;
    assert_eq!(record.messages[0].status, MessageStatus::Error);
    assert_eq!(record.agent_type, "unknown");
    assert_eq!(record.cwd, ".");
}
