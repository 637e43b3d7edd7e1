//! Wire and domain types shared by the session engine
//!
//! Messages, checkpoints and thread states follow the shape the agent
//! backend speaks, so the same structs are used for optimistic local
//! entries and for authoritative server snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Values key the backend sets while a run is paused on an interrupt.
pub const INTERRUPT_MARKER: &str = "__interrupt__";

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    #[serde(alias = "AIMessageChunk", alias = "AIMessage", alias = "assistant")]
    Ai,
    Tool,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Human => "human",
            Self::Ai => "ai",
            Self::Tool => "tool",
            Self::System => "system",
        };
        f.write_str(name)
    }
}

/// Reference to a server-stored file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileData {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

impl FileData {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            file_id: None,
        }
    }

    pub fn with_file_id(mut self, file_id: impl Into<String>) -> Self {
        self.file_id = Some(file_id.into());
        self
    }

    /// The upload server only assigns a file id to images.
    pub fn is_image(&self) -> bool {
        self.file_id.is_some()
    }

    /// Path without the storage prefix
    pub fn display_name(&self) -> &str {
        self.path.strip_prefix("files/").unwrap_or(&self.path)
    }
}

/// Label attached to a selected artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionEntry {
    #[serde(rename = "alt", default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Artifact id -> selection entry
pub type SelectedMap = BTreeMap<String, SelectionEntry>;

/// A tool invocation requested by the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// Free-form message metadata (`additional_kwargs` on the wire)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Raw text the user typed, before any server-side rewriting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_input: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub files: Vec<FileData>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub selected: SelectedMap,
    /// Already revealed once; the typewriter must not animate it again
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub rendered: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A conversation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub role: Role,
    #[serde(default, deserialize_with = "content_as_text")]
    pub content: String,
    #[serde(rename = "additional_kwargs", default, deserialize_with = "null_as_default")]
    pub metadata: MessageMetadata,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a message with a fresh client-side id
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            metadata: MessageMetadata::default(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Human message carrying the composer's text, files and selection
    pub fn human(turn: &HumanTurn) -> Self {
        let mut message = Self::new(Role::Human, turn.text.clone());
        message.metadata.user_input = Some(turn.text.clone());
        message.metadata.files = turn.files.clone();
        message.metadata.selected = turn.selected.clone();
        message
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(Role::Ai, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Assign a client id to messages the server sent without one
    pub fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = uuid::Uuid::new_v4().to_string();
        }
    }

    /// Text a renderer should show for this message
    pub fn display_text(&self) -> &str {
        match (self.role, &self.metadata.user_input) {
            (Role::Human, Some(input)) => input,
            _ => &self.content,
        }
    }
}

/// What the user composed for the next human turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HumanTurn {
    pub text: String,
    pub files: Vec<FileData>,
    pub selected: SelectedMap,
}

impl HumanTurn {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_files(mut self, files: Vec<FileData>) -> Self {
        self.files = files;
        self
    }

    pub fn with_selected(mut self, selected: SelectedMap) -> Self {
        self.selected = selected;
        self
    }
}

/// Opaque checkpoint identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointId(pub String);

impl CheckpointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checkpoint address as the backend reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRef {
    pub checkpoint_id: CheckpointId,
    #[serde(default)]
    pub checkpoint_ns: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl CheckpointRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            checkpoint_id: CheckpointId::new(id),
            checkpoint_ns: String::new(),
            thread_id: None,
        }
    }
}

/// Graph state values: the message list plus arbitrary extra keys
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadValues {
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages: Vec<Message>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ThreadValues {
    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            extra: Map::new(),
        }
    }

    /// True while the backend is recomputing state after an interrupt
    pub fn has_unstable_marker(&self) -> bool {
        self.extra.contains_key(INTERRUPT_MARKER)
    }

    /// Interrupt advertised inline in the values, if any
    pub fn inline_interrupt(&self) -> Option<Interrupt> {
        match self.extra.get(INTERRUPT_MARKER)? {
            Value::Array(items) => items.first().map(Interrupt::from_record),
            other => Some(Interrupt::from_record(other)),
        }
    }
}

/// A pending task in a thread state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadTask {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub interrupts: Vec<Value>,
}

/// One entry of a thread's checkpoint history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadState {
    #[serde(default)]
    pub values: ThreadValues,
    #[serde(default, deserialize_with = "null_as_default")]
    pub next: Vec<String>,
    pub checkpoint: CheckpointRef,
    #[serde(default)]
    pub parent_checkpoint: Option<CheckpointRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tasks: Vec<ThreadTask>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ThreadState {
    pub fn id(&self) -> &CheckpointId {
        &self.checkpoint.checkpoint_id
    }

    pub fn parent_id(&self) -> Option<&CheckpointId> {
        self.parent_checkpoint.as_ref().map(|p| &p.checkpoint_id)
    }

    /// First interrupt raised by any task of this state
    pub fn interrupt(&self) -> Option<Interrupt> {
        self.tasks
            .iter()
            .flat_map(|task| task.interrupts.iter())
            .map(Interrupt::from_record)
            .next()
            .or_else(|| self.values.inline_interrupt())
    }

    pub fn contains_message(&self, message_id: &str) -> bool {
        self.values.messages.iter().any(|m| m.id == message_id)
    }
}

/// Typed payload of an interrupt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptPayload {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A server-issued request for a human decision
#[derive(Debug, Clone, PartialEq)]
pub struct Interrupt {
    pub id: Option<String>,
    pub payload: InterruptPayload,
}

impl Interrupt {
    /// Build from either `{value: {...}, id}` records or a bare payload
    pub fn from_record(record: &Value) -> Self {
        let id = record.get("id").and_then(Value::as_str).map(str::to_string);
        let value = record.get("value").unwrap_or(record);
        let payload = serde_json::from_value(value.clone()).unwrap_or(InterruptPayload {
            kind: String::new(),
            extra: Map::new(),
        });
        Self { id, payload }
    }

    pub fn is_approval(&self) -> bool {
        self.payload.kind == "approve"
    }
}

/// Kind of decision sent to resume an interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Approve,
    Comment,
}

/// Decision payload for `command.resume`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(rename = "type")]
    pub kind: DecisionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Decision {
    pub fn approve() -> Self {
        Self {
            kind: DecisionKind::Approve,
            message: None,
        }
    }

    pub fn comment(message: impl Into<String>) -> Self {
        Self {
            kind: DecisionKind::Comment,
            message: Some(message.into()),
        }
    }

    /// Non-empty free text, if any
    pub fn text(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.trim().is_empty())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Content arrives either as a string or as a list of typed parts.
fn content_as_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(s) => Some(s.as_str()),
                other => other.get("text").and_then(Value::as_str),
            })
            .collect(),
        Some(other) => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_from_wire() {
        let message: Message = serde_json::from_value(json!({
            "id": "m1",
            "type": "human",
            "content": "describe these",
            "additional_kwargs": {
                "user_input": "describe these",
                "files": [{"path": "files/a.png", "file_id": "f1"}],
                "selected": {"plot-1": {"alt": "sales"}}
            }
        }))
        .unwrap();

        assert_eq!(message.role, Role::Human);
        assert_eq!(message.metadata.files.len(), 1);
        assert!(message.metadata.files[0].is_image());
        assert_eq!(
            message.metadata.selected["plot-1"].label.as_deref(),
            Some("sales")
        );
    }

    #[test]
    fn test_chunk_role_and_part_content() {
        let message: Message = serde_json::from_value(json!({
            "id": "run-1",
            "type": "AIMessageChunk",
            "content": [{"type": "text", "text": "Hel"}, {"type": "text", "text": "lo"}],
            "additional_kwargs": null,
            "tool_calls": null
        }))
        .unwrap();

        assert_eq!(message.role, Role::Ai);
        assert_eq!(message.content, "Hello");
        assert!(message.tool_calls.is_empty());
    }

    #[test]
    fn test_human_display_prefers_user_input() {
        let mut message = Message::human(&HumanTurn::text("raw"));
        message.content = "rewritten by server".to_string();
        assert_eq!(message.display_text(), "raw");

        let ai = Message::ai("answer");
        assert_eq!(ai.display_text(), "answer");
    }

    #[test]
    fn test_interrupt_from_task_record() {
        let state: ThreadState = serde_json::from_value(json!({
            "values": {"messages": []},
            "next": ["agent"],
            "checkpoint": {"checkpoint_id": "c2"},
            "parent_checkpoint": {"checkpoint_id": "c1"},
            "tasks": [{"id": "t", "name": "tools", "interrupts": [{"value": {"type": "approve"}, "id": "i1"}]}]
        }))
        .unwrap();

        let interrupt = state.interrupt().unwrap();
        assert!(interrupt.is_approval());
        assert_eq!(interrupt.id.as_deref(), Some("i1"));
        assert_eq!(state.parent_id(), Some(&CheckpointId::new("c1")));
    }

    #[test]
    fn test_unstable_marker() {
        let values: ThreadValues = serde_json::from_value(json!({
            "messages": [],
            "__interrupt__": [{"value": {"type": "approve"}}]
        }))
        .unwrap();
        assert!(values.has_unstable_marker());
        assert!(values.inline_interrupt().unwrap().is_approval());
    }

    #[test]
    fn test_decision_wire_format() {
        let approve = serde_json::to_value(Decision::approve()).unwrap();
        assert_eq!(approve, json!({"type": "approve"}));

        let comment = serde_json::to_value(Decision::comment("use a bar chart")).unwrap();
        assert_eq!(comment, json!({"type": "comment", "message": "use a bar chart"}));
        assert_eq!(Decision::comment("  ").text(), None);
    }

    #[test]
    fn test_file_display_name() {
        assert_eq!(FileData::new("files/report.pdf").display_name(), "report.pdf");
        assert_eq!(FileData::new("report.pdf").display_name(), "report.pdf");
    }
}
