use super::*;
use crate::error::ClientError;
use crate::events::SessionEvent;
use crate::testing::FakeAgentServer;
use crate::types::{CheckpointId, Decision, HumanTurn, Message, Role, ThreadState};
use serde_json::json;
use std::sync::Arc;

fn session(server: &FakeAgentServer) -> SessionManager {
    SessionManager::new(Arc::new(server.clone()), SessionOptions::default())
}

fn contents(session: &SessionManager) -> Vec<String> {
    session
        .snapshot()
        .messages
        .iter()
        .map(|m| m.content.clone())
        .collect()
}

#[tokio::test]
async fn test_submit_is_optimistic_then_merged() {
    let server = FakeAgentServer::new();
    let session = session(&server);

    let handle = session.submit(HumanTurn::text("hello")).unwrap();
    let snapshot = session.snapshot();
    assert!(snapshot.is_loading);
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.messages[0].content, "hello");
    let human_id = snapshot.messages[0].id.clone();

    handle.wait().await;

    let snapshot = session.snapshot();
    assert!(!snapshot.is_loading);
    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.messages.len(), 2);
    assert_eq!(snapshot.messages[0].id, human_id);
    assert_eq!(snapshot.messages[1].role, Role::Ai);
    assert!(snapshot.messages[1].content.ends_with("hello"));
    assert!(snapshot.thread_id.is_some());

    let runs = server.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].request.messages()[0].id, human_id);
}

#[tokio::test]
async fn test_events_are_published_for_a_run() {
    let server = FakeAgentServer::new();
    let session = session(&server);
    let mut events = session.subscribe();

    session.submit(HumanTurn::text("hi")).unwrap().wait().await;

    let mut types = Vec::new();
    while let Ok(event) = events.try_recv() {
        types.push(event.event_type());
    }
    assert_eq!(types, vec!["thread_created", "run_started", "run_finished"]);
}

#[tokio::test]
async fn test_second_submit_while_streaming_is_busy() {
    let server = FakeAgentServer::new();
    let session = session(&server);
    let release = server.pause_next_run(1);

    let handle = session.submit(HumanTurn::text("first")).unwrap();
    tokio::task::yield_now().await;

    let result = session.submit(HumanTurn::text("second"));
    assert!(matches!(result, Err(ClientError::Busy(_))));
    assert_eq!(contents(&session), vec!["first"]);

    release.notify_one();
    handle.wait().await;
    assert_eq!(session.snapshot().messages.len(), 2);
}

#[tokio::test]
async fn test_interrupt_blocks_new_turns_until_resumed() {
    let server = FakeAgentServer::new();
    server.interrupt_on("deploy");
    let session = session(&server);
    let mut events = session.subscribe();

    session.submit(HumanTurn::text("please deploy")).unwrap().wait().await;

    let interrupt = session.interrupt().expect("interrupt pending");
    assert!(interrupt.is_approval());
    assert!(!session.snapshot().can_submit());
    assert!(matches!(
        session.submit(HumanTurn::text("anything")),
        Err(ClientError::InterruptPending)
    ));
    let raised = std::iter::from_fn(|| events.try_recv().ok())
        .any(|e| matches!(e, SessionEvent::InterruptRaised { ref kind, .. } if kind == "approve"));
    assert!(raised);

    let handle = session.resume(Decision::approve()).unwrap().expect("run started");
    assert!(session.interrupt().is_none());
    handle.wait().await;

    let snapshot = session.snapshot();
    assert!(snapshot.interrupt.is_none());
    assert_eq!(snapshot.last_message().unwrap().content, "Approved, running the tool.");
    assert!(session.submit(HumanTurn::text("next")).is_ok());
}

#[tokio::test]
async fn test_resume_with_comment_shows_decline_immediately() {
    let server = FakeAgentServer::new();
    server.interrupt_on("deploy");
    let session = session(&server);
    session.submit(HumanTurn::text("deploy it")).unwrap().wait().await;

    let handle = session
        .resume(Decision::comment("use staging"))
        .unwrap()
        .expect("run started");
    let optimistic = session.snapshot();
    let last = optimistic.last_message().unwrap();
    assert_eq!(last.role, Role::Tool);
    assert_eq!(last.content, "<decline>use staging</decline>");

    handle.wait().await;

    let snapshot = session.snapshot();
    let declines = snapshot
        .messages
        .iter()
        .filter(|m| m.content == "<decline>use staging</decline>")
        .count();
    assert_eq!(declines, 1);
    assert_eq!(snapshot.last_message().unwrap().content, "Revised plan: use staging");

    let runs = server.runs();
    let resume = runs.last().unwrap().request.command.as_ref().unwrap();
    assert_eq!(resume.resume, Decision::comment("use staging"));
}

#[tokio::test]
async fn test_resume_without_interrupt_is_a_no_op() {
    let server = FakeAgentServer::new();
    let session = session(&server);

    assert!(session.resume(Decision::approve()).unwrap().is_none());
    assert!(server.runs().is_empty());
}

#[tokio::test]
async fn test_run_error_is_sticky_and_resubmit_continues() {
    let server = FakeAgentServer::new();
    server.fail_next_run("model overloaded");
    let session = session(&server);

    session.submit(HumanTurn::text("hi")).unwrap().wait().await;

    let snapshot = session.snapshot();
    assert!(!snapshot.is_loading);
    let error = snapshot.error.expect("sticky error");
    assert_eq!(error.kind, SessionErrorKind::Run);
    assert!(error.message.contains("model overloaded"));

    session.resubmit_last().unwrap().wait().await;

    let snapshot = session.snapshot();
    assert!(snapshot.error.is_none());
    let last_run = server.runs().pop().unwrap();
    assert!(last_run.request.input.is_none());
    assert_eq!(snapshot.messages.len(), 2);
    assert_eq!(snapshot.messages[0].content, "hi");
}

#[tokio::test]
async fn test_unacknowledged_submission_is_replayed() {
    let server = FakeAgentServer::new();
    server.reject_next_request(ClientError::http("connection refused", None));
    let session = session(&server);

    session.submit(HumanTurn::text("hi")).unwrap().wait().await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.error.as_ref().unwrap().kind, SessionErrorKind::Transport);
    assert_eq!(contents(&session), vec!["hi"]);
    let human_id = snapshot.messages[0].id.clone();

    session.resubmit_last().unwrap().wait().await;

    let snapshot = session.snapshot();
    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.messages.len(), 2);
    assert_eq!(snapshot.messages[0].id, human_id);
}

#[tokio::test]
async fn test_disconnect_keeps_loading_and_rejoin_completes() {
    let server = FakeAgentServer::new();
    server.disconnect_next_run();
    let session = session(&server);

    session.submit(HumanTurn::text("long task")).unwrap().wait().await;

    let snapshot = session.snapshot();
    assert!(snapshot.is_loading);
    assert!(snapshot.disconnected);
    assert!(snapshot.error.is_none());
    assert!(snapshot.can_submit());
    assert!(snapshot.run_id.is_some());

    session.rejoin().unwrap().wait().await;

    let snapshot = session.snapshot();
    assert!(!snapshot.is_loading);
    assert!(!snapshot.disconnected);
    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.messages.len(), 2);
    assert!(snapshot.messages[1].content.ends_with("long task"));
}

#[tokio::test]
async fn test_rejoin_requires_a_run() {
    let server = FakeAgentServer::new();
    let session = session(&server);

    assert!(matches!(session.rejoin(), Err(ClientError::InvalidInput(_))));
}

#[tokio::test]
async fn test_regenerate_ai_message_forks_sibling() {
    let server = FakeAgentServer::new();
    let session = session(&server);
    session.submit(HumanTurn::text("hi")).unwrap().wait().await;
    let first_reply = session.snapshot().messages[1].clone();
    assert_eq!(session.branch(&first_reply.id).unwrap().branch_options.len(), 1);

    let handle = session.regenerate(&first_reply.id).unwrap();
    assert_eq!(contents(&session), vec!["hi"]);
    handle.wait().await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.messages.len(), 2);
    let second_reply = &snapshot.messages[1];
    assert_ne!(second_reply.id, first_reply.id);
    let meta = snapshot.branch(&second_reply.id).unwrap();
    assert_eq!(meta.branch_options.len(), 2);
    assert_eq!(meta.index(), Some(1));

    session.set_branch(&meta.branch_options[0]).unwrap();
    let snapshot = session.snapshot();
    assert_eq!(snapshot.messages[1].id, first_reply.id);
    assert_eq!(snapshot.branch(&first_reply.id).unwrap().index(), Some(0));
}

#[tokio::test]
async fn test_regenerate_human_message_keeps_it() {
    let server = FakeAgentServer::new();
    let session = session(&server);
    session.submit(HumanTurn::text("hi")).unwrap().wait().await;
    let human = session.snapshot().messages[0].clone();

    let handle = session.regenerate(&human.id).unwrap();
    assert_eq!(contents(&session), vec!["hi"]);
    handle.wait().await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.messages.len(), 2);
    assert_eq!(snapshot.messages[0].id, human.id);
    assert_eq!(snapshot.branch(&human.id).unwrap().branch_options.len(), 2);
}

#[tokio::test]
async fn test_edit_replaces_human_message_on_new_branch() {
    let server = FakeAgentServer::new();
    let session = session(&server);
    session.submit(HumanTurn::text("helo")).unwrap().wait().await;
    session.submit(HumanTurn::text("more")).unwrap().wait().await;
    let original = session.snapshot().messages[0].clone();

    let handle = session.edit(&original.id, HumanTurn::text("hello")).unwrap();
    assert_eq!(contents(&session), vec!["hello"]);
    handle.wait().await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.messages.len(), 2);
    assert_eq!(snapshot.messages[0].content, "hello");
    assert!(snapshot.messages[1].content.ends_with("hello"));
    let meta = snapshot.branch(&snapshot.messages[0].id).unwrap().clone();
    assert_eq!(meta.branch_options.len(), 2);
    assert_eq!(meta.index(), Some(1));

    // The old branch still holds the full original conversation
    session.set_branch(&meta.branch_options[0]).unwrap();
    let old: Vec<String> = contents(&session);
    assert_eq!(old.len(), 4);
    assert_eq!(old[0], "helo");
    assert_eq!(old[2], "more");
}

#[tokio::test]
async fn test_edit_rejects_ai_and_unknown_messages() {
    let server = FakeAgentServer::new();
    let session = session(&server);
    session.submit(HumanTurn::text("hi")).unwrap().wait().await;
    let reply = session.snapshot().messages[1].id.clone();

    assert!(matches!(
        session.edit(&reply, HumanTurn::text("x")),
        Err(ClientError::InvalidInput(_))
    ));
    assert!(matches!(
        session.regenerate("missing"),
        Err(ClientError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_set_branch_refused_while_loading() {
    let server = FakeAgentServer::new();
    let session = session(&server);
    session.submit(HumanTurn::text("hi")).unwrap().wait().await;
    let branch = session.branch(&session.snapshot().messages[1].id).unwrap().branch;

    let release = server.pause_next_run(1);
    let handle = session.submit(HumanTurn::text("again")).unwrap();
    assert!(matches!(session.set_branch(&branch), Err(ClientError::Busy(_))));

    release.notify_one();
    handle.wait().await;
    assert!(session.set_branch(&branch).is_ok());
    assert!(matches!(
        session.set_branch(&CheckpointId::new("nope")),
        Err(ClientError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_switch_thread_discards_stale_run() {
    let server = FakeAgentServer::new();
    server.seed_thread(
        "thread-other",
        vec![
            Message::new(Role::Human, "old question").with_id("h-old"),
            Message::ai("old answer").with_id("a-old"),
        ],
    );
    let session = session(&server);

    let release = server.pause_next_run(1);
    let handle = session.submit(HumanTurn::text("in flight")).unwrap();
    tokio::task::yield_now().await;

    session
        .switch_thread(Some("thread-other".to_string()))
        .await
        .unwrap();
    release.notify_one();
    handle.wait().await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.thread_id.as_deref(), Some("thread-other"));
    assert!(!snapshot.is_loading);
    assert_eq!(contents(&session), vec!["old question", "old answer"]);
}

#[tokio::test]
async fn test_switch_to_new_thread_clears_state() {
    let server = FakeAgentServer::new();
    let session = session(&server);
    session.submit(HumanTurn::text("hi")).unwrap().wait().await;

    session.switch_thread(None).await.unwrap();

    let snapshot = session.snapshot();
    assert!(snapshot.thread_id.is_none());
    assert!(snapshot.messages.is_empty());
    assert!(snapshot.branches.is_empty());
}

#[tokio::test]
async fn test_switch_thread_history_failure_is_reported() {
    let server = FakeAgentServer::new();
    server.reject_history(Some(ClientError::http("gateway timeout", Some(504))));
    let session = session(&server);

    let result = session.switch_thread(Some("thread-x".to_string())).await;

    assert!(result.is_err());
    let snapshot = session.snapshot();
    assert!(!snapshot.is_loading);
    assert!(snapshot.error.is_some());
}

#[tokio::test]
async fn test_custom_events_fill_extensions() {
    let server = FakeAgentServer::new();
    server.emit_custom(AGENT_EXECUTION, json!({"agent": "planner", "node": "search"}));
    let session = session(&server);

    session.submit(HumanTurn::text("hi")).unwrap().wait().await;

    let extensions = session.snapshot().extensions;
    assert_eq!(extensions[AGENT_EXECUTION]["node"], "search");
}

#[tokio::test]
async fn test_mark_rendered_survives_history_refresh() {
    let server = FakeAgentServer::new();
    let session = session(&server);
    session.submit(HumanTurn::text("one")).unwrap().wait().await;
    let reply = session.snapshot().messages[1].id.clone();

    session.mark_rendered(&reply);
    session.submit(HumanTurn::text("two")).unwrap().wait().await;

    let snapshot = session.snapshot();
    assert!(snapshot.message(&reply).unwrap().metadata.rendered);
    assert!(!snapshot.last_message().unwrap().metadata.rendered);
}

#[tokio::test]
async fn test_watch_receives_snapshots() {
    let server = FakeAgentServer::new();
    let session = session(&server);
    let mut watch = session.watch();

    session.submit(HumanTurn::text("hi")).unwrap().wait().await;

    assert!(watch.has_changed().unwrap());
    let latest = watch.borrow_and_update().clone();
    assert_eq!(latest.messages.len(), 2);
}

fn linear_history(server: &FakeAgentServer, thread: &str) -> Vec<ThreadState> {
    let mut history = server.checkpoints(thread);
    history.reverse();
    history
}

#[test]
fn test_tree_active_path_is_contiguous() {
    let server = FakeAgentServer::new();
    server.seed_thread(
        "t",
        vec![
            Message::new(Role::Human, "a").with_id("m1"),
            Message::ai("b").with_id("m2"),
            Message::new(Role::Human, "c").with_id("m3"),
        ],
    );
    let tree = CheckpointTree::from_history(linear_history(&server, "t"));

    let path = tree.active_path();
    assert_eq!(path.len(), 3);
    for pair in path.windows(2) {
        assert_eq!(pair[1].parent_id(), Some(pair[0].id()));
    }
    let meta = tree.branch_metadata();
    assert_eq!(meta["m3"].branch, *path[2].id());
    assert_eq!(meta["m1"].parent_checkpoint, None);
}

#[test]
fn test_tree_window_truncation_makes_roots() {
    let server = FakeAgentServer::new();
    server.seed_thread(
        "t",
        vec![
            Message::new(Role::Human, "a").with_id("m1"),
            Message::ai("b").with_id("m2"),
            Message::new(Role::Human, "c").with_id("m3"),
        ],
    );
    let mut history = linear_history(&server, "t");
    history.truncate(2);

    let tree = CheckpointTree::from_history(history);

    assert_eq!(tree.len(), 2);
    assert_eq!(tree.children(None).len(), 1);
    assert_eq!(tree.active_path().len(), 2);
    assert_eq!(tree.head().unwrap().values.messages.len(), 3);
}
