//! Stabilization filter for the session's message list
//!
//! While the backend recomputes state after an interrupt it may publish
//! values that are momentarily incomplete. Those are marked with the
//! `__interrupt__` key; the reconciler keeps showing the last good list
//! until a complete one arrives.

use crate::session::SessionSnapshot;
use crate::types::Message;

/// Pure transition: keep `previous` unless `raw` is stable and non-empty
pub fn next_stable<'a>(previous: &'a [Message], raw: &'a [Message], unstable: bool) -> &'a [Message] {
    if unstable || raw.is_empty() {
        previous
    } else {
        raw
    }
}

/// Holds the last stable message list across snapshots
#[derive(Debug, Clone, Default)]
pub struct MessageReconciler {
    stable: Vec<Message>,
}

impl MessageReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with an initial list, e.g. when switching threads
    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self { stable: messages }
    }

    /// Feed a raw list; returns the list to render
    pub fn update(&mut self, raw: &[Message], unstable: bool) -> &[Message] {
        self.stable = next_stable(&self.stable, raw, unstable).to_vec();
        &self.stable
    }

    pub fn reconcile(&mut self, snapshot: &SessionSnapshot) -> &[Message] {
        self.update(&snapshot.messages, snapshot.is_unstable())
    }

    pub fn messages(&self) -> &[Message] {
        &self.stable
    }

    /// Forget the held list; the next stable update replaces it
    pub fn reset(&mut self) {
        self.stable.clear();
    }
}
