//! In-memory agent backend
//!
//! Runs are simulated synchronously when they start: checkpoints are
//! persisted immediately and the stream replays the resulting events. The
//! checkpoint shapes mimic a graph backend: an input checkpoint holding the
//! pending human message, a checkpoint with the message applied and one
//! checkpoint per agent reply.

use crate::error::{ClientError, ClientResult};
use crate::stream::{CustomEvent, EventStream, StreamEvent};
use crate::transport::{AgentTransport, ArtifactStore, RunRequest, StoreItem};
use crate::types::{
    CheckpointId, CheckpointRef, DecisionKind, Message, Role, ThreadState, ThreadTask, ThreadValues,
    INTERRUPT_MARKER,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

/// A run request as the fake received it
#[derive(Debug, Clone)]
pub struct RecordedRun {
    pub thread_id: String,
    pub request: RunRequest,
}

#[derive(Debug, Clone)]
struct Pause {
    before_event: usize,
    release: Arc<Notify>,
}

#[derive(Default)]
struct FakeState {
    counter: u64,
    threads: HashMap<String, Vec<ThreadState>>,
    pending_input: HashMap<CheckpointId, Vec<Message>>,
    runs: Vec<RecordedRun>,
    run_events: HashMap<String, Vec<StreamEvent>>,
    history_calls: usize,
    interrupt_trigger: Option<String>,
    custom_events: Vec<CustomEvent>,
    fail_next_run: Option<String>,
    disconnect_next_run: bool,
    reject_next_request: Option<ClientError>,
    reject_history: Option<ClientError>,
    pause_next_run: Option<Pause>,
    store: HashMap<(String, String), StoreItem>,
    broken_store_keys: Vec<String>,
}

impl FakeState {
    fn next(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{}-{:03}", prefix, self.counter)
    }

    fn checkpoint(
        &mut self,
        thread_id: &str,
        parent: Option<&ThreadState>,
        messages: Vec<Message>,
    ) -> ThreadState {
        let id = self.next("cp");
        ThreadState {
            values: ThreadValues::with_messages(messages),
            next: Vec::new(),
            checkpoint: CheckpointRef {
                checkpoint_id: CheckpointId::new(id),
                checkpoint_ns: String::new(),
                thread_id: Some(thread_id.to_string()),
            },
            parent_checkpoint: parent.map(|p| p.checkpoint.clone()),
            tasks: Vec::new(),
            created_at: Some(chrono::Utc::now()),
        }
    }
}

/// Scriptable stand-in for the agent backend and its artifact store
#[derive(Clone, Default)]
pub struct FakeAgentServer {
    state: Arc<Mutex<FakeState>>,
}

impl std::fmt::Debug for FakeAgentServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FakeAgentServer")
            .field("threads", &state.threads.len())
            .field("runs", &state.runs.len())
            .finish()
    }
}

impl FakeAgentServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Human messages containing `trigger` make the agent ask for approval
    pub fn interrupt_on(&self, trigger: impl Into<String>) -> &Self {
        self.state.lock().interrupt_trigger = Some(trigger.into());
        self
    }

    /// Emit a custom event at the start of every run
    pub fn emit_custom(&self, name: &str, props: Value) -> &Self {
        let event = CustomEvent {
            id: None,
            name: name.to_string(),
            props,
            extra: Map::new(),
        };
        self.state.lock().custom_events.push(event);
        self
    }

    /// The next run reports an `error` event instead of its reply
    pub fn fail_next_run(&self, message: impl Into<String>) -> &Self {
        self.state.lock().fail_next_run = Some(message.into());
        self
    }

    /// The next run's stream drops after the first message chunk
    pub fn disconnect_next_run(&self) -> &Self {
        self.state.lock().disconnect_next_run = true;
        self
    }

    /// The next create-thread or start-run request fails outright
    pub fn reject_next_request(&self, error: ClientError) -> &Self {
        self.state.lock().reject_next_request = Some(error);
        self
    }

    pub fn reject_history(&self, error: Option<ClientError>) -> &Self {
        self.state.lock().reject_history = error;
        self
    }

    /// Hold the next run's stream before event `before_event` until released
    pub fn pause_next_run(&self, before_event: usize) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        self.state.lock().pause_next_run = Some(Pause {
            before_event,
            release: Arc::clone(&release),
        });
        release
    }

    pub fn put_item(&self, namespace: &str, key: &str, item: StoreItem) {
        self.state
            .lock()
            .store
            .insert((namespace.to_string(), key.to_string()), item);
    }

    /// Requests for `key` fail with a transport error
    pub fn break_item(&self, key: &str) {
        self.state.lock().broken_store_keys.push(key.to_string());
    }

    pub fn runs(&self) -> Vec<RecordedRun> {
        self.state.lock().runs.clone()
    }

    pub fn history_calls(&self) -> usize {
        self.state.lock().history_calls
    }

    /// All checkpoints of a thread, oldest first
    pub fn checkpoints(&self, thread_id: &str) -> Vec<ThreadState> {
        self.state
            .lock()
            .threads
            .get(thread_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Seed a thread with a linear conversation, one checkpoint per message
    pub fn seed_thread(&self, thread_id: &str, messages: Vec<Message>) {
        let mut state = self.state.lock();
        let mut chain: Vec<ThreadState> = Vec::new();
        let mut values = Vec::new();
        for message in messages {
            values.push(message);
            let parent = chain.last().cloned();
            let checkpoint = state.checkpoint(thread_id, parent.as_ref(), values.clone());
            chain.push(checkpoint);
        }
        state.threads.insert(thread_id.to_string(), chain);
    }

    fn simulate(&self, thread_id: &str, request: &RunRequest) -> ClientResult<(String, Vec<StreamEvent>)> {
        let mut state = self.state.lock();
        let history = state.threads.get(thread_id).cloned().ok_or_else(|| {
            ClientError::http(format!("thread {} not found", thread_id), Some(404))
        })?;

        let base = match &request.checkpoint {
            Some(checkpoint) => Some(
                history
                    .iter()
                    .find(|s| s.checkpoint.checkpoint_id == checkpoint.checkpoint_id)
                    .cloned()
                    .ok_or_else(|| {
                        ClientError::http(format!("checkpoint {} not found", checkpoint.checkpoint_id), Some(404))
                    })?,
            ),
            None => history.last().cloned(),
        };

        let run_id = state.next("run");
        let mut created: Vec<ThreadState> = Vec::new();
        let mut events = vec![StreamEvent::Metadata {
            run_id: run_id.clone(),
            thread_id: Some(thread_id.to_string()),
        }];
        events.extend(state.custom_events.iter().cloned().map(StreamEvent::Custom));

        let base_messages = base
            .as_ref()
            .map(|s| s.values.messages.clone())
            .unwrap_or_default();

        let applied = if let Some(command) = &request.command {
            let head = base.clone().ok_or_else(|| ClientError::http("nothing to resume", Some(400)))?;
            if head.tasks.iter().all(|t| t.interrupts.is_empty()) {
                return Err(ClientError::http("no pending interrupt", Some(400)));
            }
            let mut messages = base_messages;
            match command.resume.kind {
                DecisionKind::Approve => messages.push(Message::ai("Approved, running the tool.").with_id(state.next("ai"))),
                DecisionKind::Comment => {
                    let text = command.resume.message.clone().unwrap_or_default();
                    messages.push(Message::tool(format!("<decline>{}</decline>", text)).with_id(state.next("tool")));
                    messages.push(Message::ai(format!("Revised plan: {}", text)).with_id(state.next("ai")));
                }
            }
            let reply = state.checkpoint(thread_id, Some(&head), messages);
            created.push(reply);
            None
        } else {
            let pending = base.as_ref().and_then(|b| state.pending_input.get(b.id()).cloned());
            let input = request.messages().to_vec();
            let (parent, to_apply) = match (input.is_empty(), pending) {
                // New input on top of an input checkpoint replaces its pending message
                (false, Some(_)) => (base.clone(), input),
                (false, None) => {
                    let mut input_cp = state.checkpoint(thread_id, base.as_ref(), base_messages.clone());
                    input_cp.next = vec!["__start__".to_string()];
                    state.pending_input.insert(input_cp.id().clone(), input.clone());
                    created.push(input_cp.clone());
                    (Some(input_cp), input)
                }
                (true, Some(pending)) => (base.clone(), pending),
                (true, None) => (None, Vec::new()),
            };
            match parent {
                Some(parent) => {
                    let mut messages = parent.values.messages.clone();
                    messages.extend(to_apply);
                    let applied = state.checkpoint(thread_id, Some(&parent), messages);
                    created.push(applied.clone());
                    Some(applied)
                }
                None => Some(base.clone().ok_or_else(|| ClientError::http("empty thread", Some(400)))?),
            }
        };

        if let Some(applied) = applied {
            events.push(StreamEvent::Values(applied.values.clone()));
            let last_human = applied
                .values
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::Human)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            let wants_approval = state
                .interrupt_trigger
                .as_ref()
                .is_some_and(|trigger| last_human.contains(trigger.as_str()));

            if wants_approval {
                let mut messages = applied.values.messages.clone();
                messages.push(Message::ai("I need approval before running the tool.").with_id(state.next("ai")));
                let mut waiting = state.checkpoint(thread_id, Some(&applied), messages);
                let interrupt_id = state.next("interrupt");
                waiting.next = vec!["tools".to_string()];
                waiting.tasks = vec![ThreadTask {
                    id: state.next("task"),
                    name: "tools".to_string(),
                    interrupts: vec![json!({"value": {"type": "approve", "tool": "python"}, "id": interrupt_id})],
                }];
                let mut streamed = waiting.values.clone();
                streamed.extra.insert(
                    INTERRUPT_MARKER.to_string(),
                    json!([{"value": {"type": "approve", "tool": "python"}, "id": interrupt_id}]),
                );
                events.push(StreamEvent::Values(streamed));
                created.push(waiting);
            } else {
                let reply_id = state.next("ai");
                let text = format!("echo #{}: {}", state.counter, last_human);
                let middle = text
                    .char_indices()
                    .nth(text.chars().count() / 2)
                    .map_or(text.len(), |(i, _)| i);
                let (head, tail) = text.split_at(middle);
                for part in [head, tail] {
                    events.push(StreamEvent::MessageChunk {
                        chunk: Message::ai(part).with_id(reply_id.clone()),
                        metadata: json!({"langgraph_node": "agent"}),
                    });
                }
                let mut messages = applied.values.messages.clone();
                messages.push(Message::ai(text).with_id(reply_id));
                let reply = state.checkpoint(thread_id, Some(&applied), messages);
                events.push(StreamEvent::Values(reply.values.clone()));
                created.push(reply);
            }
        } else if let Some(reply) = created.last() {
            events.push(StreamEvent::Values(reply.values.clone()));
        }

        if let Some(message) = state.fail_next_run.take() {
            created.retain(|cp| cp.next.first().map(String::as_str) == Some("__start__"));
            events.truncate(1);
            events.push(StreamEvent::Error {
                error: "RuntimeError".to_string(),
                message,
            });
        }
        events.push(StreamEvent::End);

        if let Some(thread) = state.threads.get_mut(thread_id) {
            thread.extend(created);
        }
        state.run_events.insert(run_id.clone(), events.clone());
        Ok((run_id, events))
    }
}

fn replay(events: Vec<StreamEvent>, pause: Option<Pause>, disconnect_after: Option<usize>) -> EventStream {
    struct Replay {
        events: VecDeque<StreamEvent>,
        index: usize,
        pause: Option<Pause>,
        disconnect_after: Option<usize>,
    }

    let state = Replay {
        events: events.into(),
        index: 0,
        pause,
        disconnect_after,
    };
    Box::pin(futures::stream::unfold(state, |mut state| async move {
        if state.disconnect_after == Some(state.index) {
            state.disconnect_after = None;
            state.events.clear();
            return Some((Err(ClientError::stream("connection reset by peer")), state));
        }
        if let Some(pause) = state.pause.take_if(|p| p.before_event == state.index) {
            pause.release.notified().await;
        }
        let event = state.events.pop_front()?;
        state.index += 1;
        Some((Ok(event), state))
    }))
}

#[async_trait]
impl AgentTransport for FakeAgentServer {
    async fn create_thread(&self) -> ClientResult<String> {
        let mut state = self.state.lock();
        if let Some(error) = state.reject_next_request.take() {
            return Err(error);
        }
        let thread_id = state.next("thread");
        state.threads.insert(thread_id.clone(), Vec::new());
        Ok(thread_id)
    }

    async fn stream_run(&self, thread_id: &str, request: RunRequest) -> ClientResult<EventStream> {
        {
            let mut state = self.state.lock();
            if let Some(error) = state.reject_next_request.take() {
                return Err(error);
            }
            state.runs.push(RecordedRun {
                thread_id: thread_id.to_string(),
                request: request.clone(),
            });
        }
        let (_, events) = self.simulate(thread_id, &request)?;
        let mut state = self.state.lock();
        let pause = state.pause_next_run.take();
        let disconnect = std::mem::take(&mut state.disconnect_next_run);
        // Metadata, custom events, input values, then the first chunk
        let disconnect_after = disconnect.then(|| {
            events
                .iter()
                .position(|e| matches!(e, StreamEvent::MessageChunk { .. }))
                .map(|i| i + 1)
                .unwrap_or(1)
        });
        Ok(replay(events, pause, disconnect_after))
    }

    async fn join_run(&self, _thread_id: &str, run_id: &str) -> ClientResult<EventStream> {
        let events = self
            .state
            .lock()
            .run_events
            .get(run_id)
            .cloned()
            .ok_or_else(|| ClientError::http(format!("run {} not found", run_id), Some(404)))?;
        Ok(replay(events, None, None))
    }

    async fn history(&self, thread_id: &str, limit: usize) -> ClientResult<Vec<ThreadState>> {
        let mut state = self.state.lock();
        state.history_calls += 1;
        if let Some(error) = state.reject_history.clone() {
            return Err(error);
        }
        let states = state
            .threads
            .get(thread_id)
            .ok_or_else(|| ClientError::http(format!("thread {} not found", thread_id), Some(404)))?;
        Ok(states.iter().rev().take(limit).cloned().collect())
    }
}

#[async_trait]
impl ArtifactStore for FakeAgentServer {
    async fn get_item(&self, namespace: &str, key: &str) -> ClientResult<Option<StoreItem>> {
        let state = self.state.lock();
        if state.broken_store_keys.iter().any(|k| k == key) {
            return Err(ClientError::http("store unavailable", Some(503)));
        }
        Ok(state
            .store
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }
}
