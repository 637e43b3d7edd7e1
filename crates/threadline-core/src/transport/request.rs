//! Run request payloads

use crate::types::{CheckpointRef, Decision, Message};
use serde::Serialize;

/// `input` of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunInput {
    pub messages: Vec<Message>,
}

/// `command` of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunCommand {
    pub resume: Decision,
}

/// Body of `POST /threads/{id}/runs/stream`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRequest {
    pub assistant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<RunInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<RunCommand>,
    pub stream_mode: Vec<String>,
    /// Keep the run going server-side if this client drops the stream
    pub on_disconnect: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<CheckpointRef>,
}

impl RunRequest {
    pub fn new(assistant_id: impl Into<String>, stream_mode: Vec<String>) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            input: None,
            command: None,
            stream_mode,
            on_disconnect: "continue".to_string(),
            checkpoint: None,
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.input = Some(RunInput { messages });
        self
    }

    pub fn with_resume(mut self, decision: Decision) -> Self {
        self.command = Some(RunCommand { resume: decision });
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: Option<CheckpointRef>) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    /// The human messages this run submits
    pub fn messages(&self) -> &[Message] {
        self.input.as_ref().map(|i| i.messages.as_slice()).unwrap_or_default()
    }
}
