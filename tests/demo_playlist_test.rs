//! A demo playlist driven through a session against the in-memory agent server

use serde_json::json;
use std::sync::Arc;
use threadline_core::demo::{DemoItem, DemoPlaylist};
use threadline_core::session::SessionOptions;
use threadline_core::testing::{FakeAgentServer, FakeUploader};
use threadline_core::typewriter::{InstantPacing, Pacing, RevealPhase, RevealRegistry};
use threadline_core::{CompositionContext, Role, SessionManager, UploadManager};

fn playlist() -> DemoPlaylist {
    let items: Vec<DemoItem> = serde_json::from_value(json!([
        {
            "id": "charts",
            "sorting": 3,
            "active": true,
            "json_data": {"message": "Chart last quarter's revenue"}
        },
        {
            "id": "landing",
            "sorting": 1,
            "active": true,
            "steps": 1,
            "json_data": {
                "message": "Build a landing page",
                "attachments": [{"path": "files/logo.png", "file_id": "img-1"}]
            }
        },
        {"id": "draft", "sorting": 2, "json_data": {"message": "unfinished"}}
    ]))
    .unwrap();
    DemoPlaylist::new(items)
}

#[tokio::test]
async fn test_demo_runs_until_step_budget_then_moves_on() {
    let server = FakeAgentServer::new();
    let session = SessionManager::new(Arc::new(server.clone()), SessionOptions::default());
    let composer = CompositionContext::new(UploadManager::new(Arc::new(FakeUploader::new())));
    let playlist = playlist();

    let current = playlist.next_active(playlist.len() - 1).unwrap();
    let demo = playlist.get(current).unwrap();
    assert_eq!(demo.id, "landing");

    session.submit(demo.opening_turn()).unwrap().wait().await;
    let messages = session.snapshot().messages;
    let opening = &messages[0];
    assert_eq!(opening.role, Role::Human);
    assert_eq!(opening.display_text(), "Build a landing page");
    assert_eq!(opening.metadata.files[0].path, "files/logo.png");

    let mut reveals = RevealRegistry::with_pacing(Arc::new(|| -> Box<dyn Pacing> {
        Box::new(InstantPacing)
    }))
    .force_reveal(true);
    reveals.sync(&messages);
    let typed = reveals.get(&opening.id).unwrap().wait_done().await;
    assert_eq!(typed.phase, RevealPhase::Done);
    assert_eq!(typed.visible, "Build a landing page");
    reveals.clear();

    let mut turns = 0;
    while !demo.is_finished(&session.snapshot().messages) {
        composer.send(&session, "continue").unwrap().wait().await;
        turns += 1;
        assert!(turns <= demo.steps, "demo never reached its step budget");
    }
    let ai_turns = session
        .snapshot()
        .messages
        .iter()
        .filter(|m| m.role == Role::Ai)
        .count();
    assert_eq!(ai_turns, 2);

    let next = playlist.next_active(current).unwrap();
    let demo = playlist.get(next).unwrap();
    assert_eq!(demo.id, "charts");

    session.switch_thread(None).await.unwrap();
    session.submit(demo.opening_turn()).unwrap().wait().await;
    let messages = session.snapshot().messages;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].display_text(), "Chart last quarter's revenue");
    assert!(messages[1].content.ends_with("Chart last quarter's revenue"));

    assert_eq!(playlist.next_active(next), Some(current));
}
