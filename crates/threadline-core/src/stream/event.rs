//! Typed run events

use super::decoder::SseFrame;
use crate::error::{ClientError, ClientResult};
use crate::types::{Message, ThreadValues};
use serde::Deserialize;
use serde_json::Value;

/// A side-channel event emitted by a graph node
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CustomEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub props: Value,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// One decoded event of a run's stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// First event of every run
    Metadata {
        run_id: String,
        thread_id: Option<String>,
    },
    /// Full state snapshot
    Values(ThreadValues),
    /// Token-level delta for one message
    MessageChunk { chunk: Message, metadata: Value },
    /// Accumulated message bodies so far
    MessagesPartial(Vec<Message>),
    /// Final message bodies
    MessagesComplete(Vec<Message>),
    Custom(CustomEvent),
    /// Per-node state updates; informational only
    Updates(Value),
    /// The run failed on the server
    Error { error: String, message: String },
    End,
    /// Anything this client does not understand
    Unknown { event: String, data: Value },
}

impl StreamEvent {
    /// Decode a raw frame; namespace suffixes like `values|tools:abc` are stripped
    pub fn from_frame(frame: &SseFrame) -> ClientResult<Self> {
        let event = frame.event.as_deref().unwrap_or("message");
        let kind = event.split('|').next().unwrap_or(event);
        let data: Value = if frame.data.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&frame.data)
                .map_err(|e| ClientError::stream(format!("malformed '{}' event: {}", event, e)))?
        };

        let parsed = match kind {
            "metadata" => Self::Metadata {
                run_id: data
                    .get("run_id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                thread_id: data.get("thread_id").and_then(Value::as_str).map(str::to_string),
            },
            "values" => Self::Values(serde_json::from_value(data)?),
            "messages" => match data {
                Value::Array(mut pair) if pair.len() == 2 && pair[0].is_object() => {
                    let metadata = pair.pop().unwrap_or(Value::Null);
                    let chunk = pair.pop().unwrap_or(Value::Null);
                    Self::MessageChunk {
                        chunk: serde_json::from_value(chunk)?,
                        metadata,
                    }
                }
                other => Self::MessagesPartial(serde_json::from_value(other)?),
            },
            "messages/partial" => Self::MessagesPartial(serde_json::from_value(data)?),
            "messages/complete" => Self::MessagesComplete(serde_json::from_value(data)?),
            "custom" => Self::Custom(serde_json::from_value(data)?),
            "updates" => Self::Updates(data),
            "error" => Self::Error {
                error: data
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("Error")
                    .to_string(),
                message: data
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| data.to_string()),
            },
            "end" => Self::End,
            other => Self::Unknown {
                event: other.to_string(),
                data,
            },
        };
        Ok(parsed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End | Self::Error { .. })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Metadata { .. } => "metadata",
            Self::Values(_) => "values",
            Self::MessageChunk { .. } => "messages",
            Self::MessagesPartial(_) => "messages/partial",
            Self::MessagesComplete(_) => "messages/complete",
            Self::Custom(_) => "custom",
            Self::Updates(_) => "updates",
            Self::Error { .. } => "error",
            Self::End => "end",
            Self::Unknown { event, .. } => event,
        }
    }
}
