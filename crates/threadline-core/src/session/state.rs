//! Published session state

use super::extensions::ExtensionState;
use super::tree::BranchMeta;
use crate::error::ClientError;
use crate::types::{Interrupt, Message};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What kind of failure the sticky error records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    /// The request never reached a running state
    Transport,
    /// The backend reported the run as failed
    Run,
}

/// Sticky, user-visible session error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    pub kind: SessionErrorKind,
    pub message: String,
}

impl SessionError {
    pub fn new(kind: SessionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn from_client(error: &ClientError) -> Self {
        let kind = match error {
            ClientError::Run(_) => SessionErrorKind::Run,
            _ => SessionErrorKind::Transport,
        };
        Self::new(kind, error.to_string())
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Immutable view of the session, as published on the watch channel
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    /// Server-assigned thread id, once known
    pub thread_id: Option<String>,
    /// Active-branch projection, possibly including optimistic entries
    pub messages: Vec<Message>,
    /// Non-message keys of the latest values snapshot
    pub values: Map<String, Value>,
    pub extensions: ExtensionState,
    pub is_loading: bool,
    pub interrupt: Option<Interrupt>,
    pub error: Option<SessionError>,
    pub run_id: Option<String>,
    /// The stream dropped while the run was still in progress
    ///
    /// Not an error: the run continues server-side and can be rejoined.
    pub disconnected: bool,
    /// Branch metadata keyed by message id
    pub branches: Arc<HashMap<String, BranchMeta>>,
}

impl SessionSnapshot {
    /// The latest values carry the unstable interrupt marker
    pub fn is_unstable(&self) -> bool {
        self.values.contains_key(crate::types::INTERRUPT_MARKER)
    }

    pub fn branch(&self, message_id: &str) -> Option<&BranchMeta> {
        self.branches.get(message_id)
    }

    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Whether a new human turn may be submitted right now
    pub fn can_submit(&self) -> bool {
        self.interrupt.is_none() && (!self.is_loading || self.disconnected)
    }
}
