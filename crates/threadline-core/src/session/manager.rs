//! The session manager: canonical conversation state for one thread at a time

use super::extensions::{ExtensionReducers, ExtensionState};
use super::merge;
use super::state::{SessionError, SessionErrorKind, SessionSnapshot};
use super::tree::{BranchMeta, CheckpointTree};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::events::{EventBus, SessionEvent};
use crate::stream::StreamEvent;
use crate::transport::{AgentTransport, RunRequest};
use crate::types::{CheckpointId, CheckpointRef, Decision, HumanTurn, Interrupt, Message, Role};
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::{AbortHandle, JoinHandle};

/// Session tunables
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub assistant_id: String,
    pub stream_modes: Vec<String>,
    /// Checkpoints fetched when rebuilding the branch tree
    pub history_limit: usize,
    pub reducers: ExtensionReducers,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

impl SessionOptions {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            assistant_id: config.assistant_id.clone(),
            stream_modes: config.stream_modes.clone(),
            history_limit: 100,
            reducers: ExtensionReducers::default(),
        }
    }
}

/// How the visible list changes before the server answers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OptimisticUpdate {
    /// Append the new human message
    #[default]
    Append,
    /// Drop the message and everything after it, then append
    TruncateFrom(String),
    /// Keep the message, drop everything after it, then append
    TruncateAfter(String),
    /// Leave the list untouched
    None,
}

/// Options for [`SessionManager::submit_with`]
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Fork from this checkpoint instead of the thread head
    pub checkpoint: Option<CheckpointRef>,
    pub optimistic: OptimisticUpdate,
}

#[derive(Debug, Clone)]
struct Submission {
    message: Option<Message>,
    resume: Option<Decision>,
    checkpoint: Option<CheckpointRef>,
    optimistic: OptimisticUpdate,
    /// Extra optimistic entries, appended after `message`
    trailing: Vec<Message>,
}

#[derive(Debug, Clone)]
enum RunKind {
    Start(Submission),
    Join { run_id: String },
}

/// Identifies the run allowed to write into the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RunToken {
    generation: u64,
    run_seq: u64,
}

enum Step {
    Continue,
    End,
    Failed,
    Stale,
}

enum RunOutcome {
    Finished { success: bool },
    Disconnected(ClientError),
    Stale,
}

#[derive(Default)]
struct Inner {
    generation: u64,
    run_seq: u64,
    thread_id: Option<String>,
    messages: Vec<Message>,
    values: Map<String, Value>,
    extensions: ExtensionState,
    tree: CheckpointTree,
    branches: Arc<HashMap<String, BranchMeta>>,
    interrupt: Option<Interrupt>,
    is_loading: bool,
    error: Option<SessionError>,
    run_id: Option<String>,
    disconnected: bool,
    /// The backend acknowledged the latest submission with a run id
    acknowledged: bool,
    last_submission: Option<Submission>,
    current_run: Option<AbortHandle>,
}

impl Inner {
    fn token(&self) -> RunToken {
        RunToken {
            generation: self.generation,
            run_seq: self.run_seq,
        }
    }

    fn is_current(&self, token: RunToken) -> bool {
        self.token() == token
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            thread_id: self.thread_id.clone(),
            messages: self.messages.clone(),
            values: self.values.clone(),
            extensions: self.extensions.clone(),
            is_loading: self.is_loading,
            interrupt: self.interrupt.clone(),
            error: self.error.clone(),
            run_id: self.run_id.clone(),
            disconnected: self.disconnected,
            branches: Arc::clone(&self.branches),
        }
    }

    /// Re-derive the projection from the head of the active path
    fn project_head(&mut self, reducers: &ExtensionReducers) {
        self.branches = Arc::new(self.tree.branch_metadata());
        let Some(head) = self.tree.head() else {
            return;
        };
        let messages = head.values.messages.clone();
        let values = head.values.extra.clone();
        let interrupt = head.interrupt();
        self.messages = merge::replace_all(&self.messages, messages);
        reducers.apply_values_ui(&mut self.extensions, &values);
        self.values = values;
        self.interrupt = interrupt;
    }

    fn apply_optimistic(&mut self, submission: &Submission) {
        let cut = match &submission.optimistic {
            OptimisticUpdate::TruncateFrom(id) => merge::position(&self.messages, id),
            OptimisticUpdate::TruncateAfter(id) => {
                merge::position(&self.messages, id).map(|index| index + 1)
            }
            OptimisticUpdate::Append | OptimisticUpdate::None => None,
        };
        if let Some(cut) = cut {
            self.messages.truncate(cut);
        }
        if submission.optimistic != OptimisticUpdate::None {
            for message in submission.message.iter().chain(&submission.trailing) {
                merge::upsert(&mut self.messages, message.clone());
            }
        }
    }

    fn reset(&mut self, thread_id: Option<String>) {
        if let Some(run) = self.current_run.take() {
            run.abort();
        }
        let generation = self.generation + 1;
        *self = Inner {
            generation,
            thread_id,
            ..Inner::default()
        };
    }
}

struct Shared {
    transport: Arc<dyn AgentTransport>,
    options: SessionOptions,
    state: Mutex<Inner>,
    snapshots: watch::Sender<SessionSnapshot>,
    events: EventBus,
}

/// Handle to a spawned run
#[derive(Debug)]
pub struct RunHandle {
    handle: JoinHandle<()>,
}

impl RunHandle {
    /// Wait until the run has been fully merged, including the history refresh
    pub async fn wait(self) {
        // A superseded run is aborted; that is not an error for the caller
        let _ = self.handle.await;
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Keeps a locally rendered, branching message history consistent with a
/// remote, streaming, interruptible agent run.
///
/// All mutating calls apply their optimistic effect synchronously and
/// return before any network round trip; the run itself is driven by a
/// spawned task, so they must be called from within a tokio runtime.
/// Every run captures the session generation and run sequence at start.
/// Results of superseded runs or of a previous thread are discarded.
#[derive(Clone)]
pub struct SessionManager {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.state.lock();
        f.debug_struct("SessionManager")
            .field("thread_id", &inner.thread_id)
            .field("messages", &inner.messages.len())
            .field("is_loading", &inner.is_loading)
            .finish()
    }
}

impl SessionManager {
    pub fn new(transport: Arc<dyn AgentTransport>, options: SessionOptions) -> Self {
        let (snapshots, _) = watch::channel(SessionSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                transport,
                options,
                state: Mutex::new(Inner::default()),
                snapshots,
                events: EventBus::default(),
            }),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.state.lock().snapshot()
    }

    /// Receive every published snapshot
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.snapshots.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    pub fn thread_id(&self) -> Option<String> {
        self.shared.state.lock().thread_id.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.lock().is_loading
    }

    pub fn interrupt(&self) -> Option<Interrupt> {
        self.shared.state.lock().interrupt.clone()
    }

    pub fn branch(&self, message_id: &str) -> Option<BranchMeta> {
        self.shared.state.lock().branches.get(message_id).cloned()
    }

    fn commit(&self, inner: &Inner) {
        self.shared.snapshots.send_replace(inner.snapshot());
    }

    fn notify(&self, events: Vec<SessionEvent>) {
        for event in events {
            self.shared.events.publish(event);
        }
    }

    /// Append a human turn at the head of the active branch
    pub fn submit(&self, turn: HumanTurn) -> ClientResult<RunHandle> {
        self.submit_with(Some(turn), SubmitOptions::default())
    }

    /// Submit a turn (or nothing, to continue from a checkpoint)
    pub fn submit_with(
        &self,
        turn: Option<HumanTurn>,
        options: SubmitOptions,
    ) -> ClientResult<RunHandle> {
        self.start(RunKind::Start(Submission {
            message: turn.as_ref().map(Message::human),
            resume: None,
            checkpoint: options.checkpoint,
            optimistic: options.optimistic,
            trailing: Vec::new(),
        }))
    }

    /// Answer the pending interrupt; `Ok(None)` when there is none
    pub fn resume(&self, decision: Decision) -> ClientResult<Option<RunHandle>> {
        if self.shared.state.lock().interrupt.is_none() {
            tracing::debug!("resume ignored, no interrupt pending");
            return Ok(None);
        }
        let trailing = decision
            .text()
            .map(|text| vec![Message::tool(format!("<decline>{}</decline>", text))])
            .unwrap_or_default();
        self.start(RunKind::Start(Submission {
            message: None,
            resume: Some(decision),
            checkpoint: None,
            optimistic: OptimisticUpdate::Append,
            trailing,
        }))
        .map(Some)
    }

    /// Retry after an error
    ///
    /// A submission the backend never acknowledged is replayed as-is;
    /// otherwise the run continues from the thread head without new input.
    pub fn resubmit_last(&self) -> ClientResult<RunHandle> {
        let submission = {
            let inner = self.shared.state.lock();
            let last = inner
                .last_submission
                .clone()
                .ok_or_else(|| ClientError::invalid_input("nothing to resubmit"))?;
            if inner.acknowledged {
                Submission {
                    message: None,
                    resume: None,
                    checkpoint: None,
                    optimistic: OptimisticUpdate::None,
                    trailing: Vec::new(),
                }
            } else {
                last
            }
        };
        self.start(RunKind::Start(submission))
    }

    /// Re-run the step that produced `message_id`, forking a sibling branch
    pub fn regenerate(&self, message_id: &str) -> ClientResult<RunHandle> {
        let (checkpoint, role) = self.fork_point(message_id)?;
        let optimistic = match role {
            Role::Human => OptimisticUpdate::TruncateAfter(message_id.to_string()),
            _ => OptimisticUpdate::TruncateFrom(message_id.to_string()),
        };
        self.submit_with(
            None,
            SubmitOptions {
                checkpoint: Some(checkpoint),
                optimistic,
            },
        )
    }

    /// Replace a human message, forking from the checkpoint before it
    pub fn edit(&self, message_id: &str, turn: HumanTurn) -> ClientResult<RunHandle> {
        let (checkpoint, role) = self.fork_point(message_id)?;
        if role != Role::Human {
            return Err(ClientError::invalid_input("only human messages can be edited"));
        }
        self.submit_with(
            Some(turn),
            SubmitOptions {
                checkpoint: Some(checkpoint),
                optimistic: OptimisticUpdate::TruncateFrom(message_id.to_string()),
            },
        )
    }

    fn fork_point(&self, message_id: &str) -> ClientResult<(CheckpointRef, Role)> {
        let inner = self.shared.state.lock();
        let role = inner
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .map(|m| m.role)
            .ok_or_else(|| ClientError::not_found(format!("message {}", message_id)))?;
        let checkpoint = inner
            .branches
            .get(message_id)
            .and_then(|meta| meta.parent_checkpoint.clone())
            .ok_or_else(|| {
                ClientError::invalid_input(format!(
                    "message {} has no checkpoint to resubmit from",
                    message_id
                ))
            })?;
        Ok((checkpoint, role))
    }

    /// Re-attach to the latest run's event stream
    pub fn rejoin(&self) -> ClientResult<RunHandle> {
        let run_id = {
            let inner = self.shared.state.lock();
            match (&inner.thread_id, &inner.run_id) {
                (Some(_), Some(run_id)) => run_id.clone(),
                _ => return Err(ClientError::invalid_input("no run to rejoin")),
            }
        };
        self.start(RunKind::Join { run_id })
    }

    fn start(&self, run: RunKind) -> ClientResult<RunHandle> {
        let token = {
            let mut inner = self.shared.state.lock();
            if inner.is_loading && !inner.disconnected {
                return Err(ClientError::busy("a run is already streaming"));
            }
            if let RunKind::Start(submission) = &run {
                let appends_turn = submission.message.is_some() && submission.checkpoint.is_none();
                if appends_turn && inner.interrupt.is_some() {
                    return Err(ClientError::InterruptPending);
                }
                if submission.resume.is_some() && inner.interrupt.is_none() {
                    return Err(ClientError::invalid_input("no interrupt pending"));
                }
                inner.apply_optimistic(submission);
                inner.interrupt = None;
                inner.acknowledged = false;
                inner.run_id = None;
                inner.last_submission = Some(submission.clone());
            }
            if let Some(previous) = inner.current_run.take() {
                previous.abort();
            }
            inner.run_seq += 1;
            inner.is_loading = true;
            inner.disconnected = false;
            self.commit(&inner);
            inner.token()
        };

        let manager = self.clone();
        let handle = tokio::spawn(async move { manager.drive(token, run).await });

        let mut inner = self.shared.state.lock();
        if inner.is_current(token) {
            inner.current_run = Some(handle.abort_handle());
        }
        Ok(RunHandle { handle })
    }

    async fn drive(self, token: RunToken, run: RunKind) {
        match self.stream(token, run).await {
            Ok(RunOutcome::Stale) => {
                tracing::debug!("discarding superseded run");
            }
            Ok(RunOutcome::Finished { success }) => self.finish(token, success).await,
            Ok(RunOutcome::Disconnected(error)) => {
                let mut inner = self.shared.state.lock();
                if !inner.is_current(token) {
                    return;
                }
                let thread_id = inner.thread_id.clone().unwrap_or_default();
                tracing::warn!(thread_id = %thread_id, run_id = ?inner.run_id, %error, "stream disconnected");
                inner.disconnected = true;
                self.commit(&inner);
                self.notify(vec![SessionEvent::StreamDisconnected {
                    thread_id,
                    reason: error.to_string(),
                }]);
            }
            Err(error) => {
                let mut inner = self.shared.state.lock();
                if !inner.is_current(token) {
                    return;
                }
                tracing::error!(thread_id = ?inner.thread_id, %error, "run failed to start");
                inner.is_loading = false;
                inner.error = Some(SessionError::from_client(&error));
                self.commit(&inner);
                self.notify(vec![SessionEvent::error(error.to_string())]);
            }
        }
    }

    async fn ensure_thread(&self, token: RunToken) -> ClientResult<Option<String>> {
        if let Some(thread_id) = self.shared.state.lock().thread_id.clone() {
            return Ok(Some(thread_id));
        }
        let thread_id = self.shared.transport.create_thread().await?;
        let mut inner = self.shared.state.lock();
        if !inner.is_current(token) {
            return Ok(None);
        }
        tracing::info!(thread_id = %thread_id, "thread created");
        inner.thread_id = Some(thread_id.clone());
        self.commit(&inner);
        self.notify(vec![SessionEvent::ThreadCreated {
            thread_id: thread_id.clone(),
        }]);
        Ok(Some(thread_id))
    }

    async fn stream(&self, token: RunToken, run: RunKind) -> ClientResult<RunOutcome> {
        let Some(thread_id) = self.ensure_thread(token).await? else {
            return Ok(RunOutcome::Stale);
        };

        let transport = &self.shared.transport;
        let mut events = match run {
            RunKind::Start(submission) => {
                let request = RunRequest::new(
                    self.shared.options.assistant_id.clone(),
                    self.shared.options.stream_modes.clone(),
                )
                .with_checkpoint(submission.checkpoint);
                let request = match (submission.message, submission.resume) {
                    (_, Some(decision)) => request.with_resume(decision),
                    (Some(message), None) => request.with_messages(vec![message]),
                    (None, None) => request,
                };
                transport.stream_run(&thread_id, request).await?
            }
            RunKind::Join { run_id } => {
                tracing::info!(thread_id = %thread_id, run_id = %run_id, "rejoining run");
                transport.join_run(&thread_id, &run_id).await?
            }
        };

        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(error) => return Ok(RunOutcome::Disconnected(error)),
            };
            match self.apply_event(token, &thread_id, event) {
                Step::Continue => {}
                Step::End => return Ok(RunOutcome::Finished { success: true }),
                Step::Failed => return Ok(RunOutcome::Finished { success: false }),
                Step::Stale => return Ok(RunOutcome::Stale),
            }
        }

        // A stream that closes without an `end` event is treated as complete
        Ok(RunOutcome::Finished { success: true })
    }

    fn apply_event(&self, token: RunToken, thread_id: &str, event: StreamEvent) -> Step {
        let reducers = &self.shared.options.reducers;
        let mut notices = Vec::new();
        let mut inner = self.shared.state.lock();
        if !inner.is_current(token) {
            return Step::Stale;
        }

        let step = match event {
            StreamEvent::Metadata { run_id, .. } => {
                tracing::debug!(thread_id = %thread_id, run_id = %run_id, "run started");
                inner.run_id = Some(run_id.clone());
                inner.acknowledged = true;
                notices.push(SessionEvent::RunStarted {
                    thread_id: thread_id.to_string(),
                    run_id,
                });
                Step::Continue
            }
            StreamEvent::Values(values) => {
                if let Some(interrupt) = values.inline_interrupt() {
                    inner.interrupt = Some(interrupt);
                }
                inner.messages = merge::replace_all(&inner.messages, values.messages);
                reducers.apply_values_ui(&mut inner.extensions, &values.extra);
                inner.values = values.extra;
                Step::Continue
            }
            StreamEvent::MessageChunk { chunk, .. } => {
                merge::append_chunk(&mut inner.messages, chunk);
                Step::Continue
            }
            StreamEvent::MessagesPartial(messages) | StreamEvent::MessagesComplete(messages) => {
                for message in messages {
                    merge::upsert(&mut inner.messages, message);
                }
                Step::Continue
            }
            StreamEvent::Custom(custom) => {
                reducers.apply(&mut inner.extensions, &custom);
                notices.push(SessionEvent::ExtensionUpdated { name: custom.name });
                Step::Continue
            }
            StreamEvent::Updates(_) => Step::Continue,
            StreamEvent::Error { error, message } => {
                tracing::warn!(thread_id = %thread_id, run_id = ?inner.run_id, %error, %message, "run reported an error");
                let text = format!("{}: {}", error, message);
                inner.error = Some(SessionError::new(SessionErrorKind::Run, text.clone()));
                notices.push(SessionEvent::error(text));
                Step::Failed
            }
            StreamEvent::End => Step::End,
            StreamEvent::Unknown { event, .. } => {
                tracing::trace!(event = %event, "ignoring unknown stream event");
                Step::Continue
            }
        };

        self.commit(&inner);
        drop(inner);
        self.notify(notices);
        step
    }

    async fn finish(&self, token: RunToken, success: bool) {
        let Some(thread_id) = self.shared.state.lock().thread_id.clone() else {
            return;
        };
        let history = self
            .shared
            .transport
            .history(&thread_id, self.shared.options.history_limit)
            .await;

        let mut inner = self.shared.state.lock();
        if !inner.is_current(token) {
            return;
        }
        match history {
            Ok(states) => {
                inner.tree.replace_history(states);
                inner.tree.follow_newest();
                let reducers = &self.shared.options.reducers;
                inner.project_head(reducers);
            }
            Err(error) => {
                tracing::warn!(thread_id = %thread_id, %error, "history refresh failed, keeping streamed state");
            }
        }
        inner.is_loading = false;
        inner.disconnected = false;
        inner.current_run = None;
        if success {
            inner.error = None;
        }

        let mut notices = vec![SessionEvent::RunFinished {
            thread_id: thread_id.clone(),
            run_id: inner.run_id.clone(),
            success,
        }];
        if let Some(interrupt) = &inner.interrupt {
            notices.push(SessionEvent::InterruptRaised {
                thread_id: thread_id.clone(),
                kind: interrupt.payload.kind.clone(),
            });
        }
        tracing::info!(thread_id = %thread_id, run_id = ?inner.run_id, success, messages = inner.messages.len(), "run finished");
        self.commit(&inner);
        drop(inner);
        self.notify(notices);
    }

    /// Choose the branch through `checkpoint`; refused while a run streams
    pub fn set_branch(&self, checkpoint: &CheckpointId) -> ClientResult<()> {
        let mut inner = self.shared.state.lock();
        if inner.is_loading {
            return Err(ClientError::busy("cannot switch branches while a run is in progress"));
        }
        if !inner.tree.select(checkpoint) {
            return Err(ClientError::not_found(format!("checkpoint {}", checkpoint)));
        }
        inner.project_head(&self.shared.options.reducers);
        self.commit(&inner);
        drop(inner);
        self.notify(vec![SessionEvent::BranchChanged {
            checkpoint_id: checkpoint.to_string(),
        }]);
        Ok(())
    }

    /// Switch to another thread (or a fresh one with `None`) and load its history
    ///
    /// Any in-flight run is detached and its late results are discarded.
    pub async fn switch_thread(&self, thread_id: Option<String>) -> ClientResult<()> {
        let generation = {
            let mut inner = self.shared.state.lock();
            inner.reset(thread_id.clone());
            inner.is_loading = thread_id.is_some();
            self.commit(&inner);
            inner.generation
        };
        self.notify(vec![SessionEvent::ThreadSwitched {
            thread_id: thread_id.clone(),
        }]);

        let Some(thread_id) = thread_id else {
            return Ok(());
        };
        tracing::info!(thread_id = %thread_id, "loading thread");
        let history = self
            .shared
            .transport
            .history(&thread_id, self.shared.options.history_limit)
            .await;

        let mut inner = self.shared.state.lock();
        if inner.generation != generation {
            return Ok(());
        }
        inner.is_loading = false;
        let result = match history {
            Ok(states) => {
                inner.tree.replace_history(states);
                inner.tree.follow_newest();
                inner.project_head(&self.shared.options.reducers);
                Ok(())
            }
            Err(error) => {
                inner.error = Some(SessionError::from_client(&error));
                Err(error)
            }
        };
        self.commit(&inner);
        result
    }

    /// Flag a message as already revealed so it is never animated again
    pub fn mark_rendered(&self, message_id: &str) {
        let mut inner = self.shared.state.lock();
        let Some(message) = inner.messages.iter_mut().find(|m| m.id == message_id) else {
            return;
        };
        if !message.metadata.rendered {
            message.metadata.rendered = true;
            self.commit(&inner);
        }
    }

    /// Dismiss the sticky error without retrying
    pub fn clear_error(&self) {
        let mut inner = self.shared.state.lock();
        if inner.error.take().is_some() {
            self.commit(&inner);
        }
    }
}
