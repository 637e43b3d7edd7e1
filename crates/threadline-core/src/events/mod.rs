//! Notification bus for session and upload transitions
//!
//! Snapshots travel over watch channels; this bus carries the discrete
//! transitions a front-end may want to react to once (a thread id was
//! learned, an upload failed, a run ended).

use tokio::sync::broadcast;

/// Transitions published by the session engine
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The server assigned an id to a lazily created thread
    ThreadCreated { thread_id: String },

    /// The active thread changed (`None` for a fresh, unsaved thread)
    ThreadSwitched { thread_id: Option<String> },

    /// A run started streaming
    RunStarted { thread_id: String, run_id: String },

    /// A run reached a terminal state
    RunFinished {
        thread_id: String,
        run_id: Option<String>,
        success: bool,
    },

    /// The event stream dropped before a terminal event
    StreamDisconnected { thread_id: String, reason: String },

    /// The server asked for a human decision
    InterruptRaised { thread_id: String, kind: String },

    /// The active branch changed
    BranchChanged { checkpoint_id: String },

    /// A side-channel extension slot was updated
    ExtensionUpdated { name: String },

    /// An upload finished and produced a file reference
    UploadCompleted { key: String, path: String },

    /// An upload failed and was removed from the attachment list
    UploadFailed {
        key: String,
        file_name: String,
        message: String,
    },

    /// A run or transport error became the session's sticky error
    Error { message: String },
}

impl SessionEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ThreadCreated { .. } => "thread_created",
            Self::ThreadSwitched { .. } => "thread_switched",
            Self::RunStarted { .. } => "run_started",
            Self::RunFinished { .. } => "run_finished",
            Self::StreamDisconnected { .. } => "stream_disconnected",
            Self::InterruptRaised { .. } => "interrupt_raised",
            Self::BranchChanged { .. } => "branch_changed",
            Self::ExtensionUpdated { .. } => "extension_updated",
            Self::UploadCompleted { .. } => "upload_completed",
            Self::UploadFailed { .. } => "upload_failed",
            Self::Error { .. } => "error",
        }
    }
}

/// Broadcast bus; every subscriber receives every event published after it subscribed
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified capacity
    ///
    /// Slow subscribers start losing the oldest events once `capacity`
    /// events are buffered.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event, returning how many subscribers will see it
    pub fn publish(&self, event: SessionEvent) -> usize {
        tracing::trace!(event = event.event_type(), "publish");
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Event filter for selective subscription
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    types: Option<Vec<&'static str>>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by event types
    pub fn only_types(mut self, types: Vec<&'static str>) -> Self {
        self.types = Some(types);
        self
    }

    pub fn matches(&self, event: &SessionEvent) -> bool {
        match &self.types {
            Some(types) => types.contains(&event.event_type()),
            None => true,
        }
    }
}

/// Subscriber that skips events outside its filter
pub struct FilteredSubscriber {
    receiver: broadcast::Receiver<SessionEvent>,
    filter: EventFilter,
}

impl FilteredSubscriber {
    pub fn new(bus: &EventBus, filter: EventFilter) -> Self {
        Self {
            receiver: bus.subscribe(),
            filter,
        }
    }

    /// Receive the next matching event
    pub async fn recv(&mut self) -> Result<SessionEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Drain already published events that match, without waiting
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        let mut matched = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => matched.push(event),
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => break,
            }
        }
        matched
    }
}
