//! Folding streamed message fragments into the projection
//!
//! Every merge is keyed by message id; positions in the list are never
//! used to identify a message.

use crate::types::Message;
use std::collections::HashMap;

/// Append a token-level chunk to the message with the same id, or add it
pub fn append_chunk(messages: &mut Vec<Message>, mut chunk: Message) {
    chunk.ensure_id();
    match messages.iter_mut().find(|m| m.id == chunk.id) {
        Some(existing) => {
            existing.content.push_str(&chunk.content);
            merge_tool_calls(existing, chunk);
        }
        None => messages.push(chunk),
    }
}

/// Replace the message with the same id, or append it
pub fn upsert(messages: &mut Vec<Message>, mut message: Message) {
    message.ensure_id();
    match messages.iter_mut().find(|m| m.id == message.id) {
        Some(existing) => {
            // Optimistic human messages carry metadata the server may echo back partially
            if message.metadata.user_input.is_none() {
                message.metadata.user_input = existing.metadata.user_input.take();
            }
            *existing = message;
        }
        None => messages.push(message),
    }
}

fn merge_tool_calls(existing: &mut Message, chunk: Message) {
    for call in chunk.tool_calls {
        let known = call
            .id
            .as_ref()
            .is_some_and(|id| existing.tool_calls.iter().any(|c| c.id.as_ref() == Some(id)));
        if !known {
            existing.tool_calls.push(call);
        }
    }
    if existing.tool_call_id.is_none() {
        existing.tool_call_id = chunk.tool_call_id;
    }
}

/// Authoritative replacement from a values snapshot
///
/// Local metadata that only exists client-side (the `rendered` flag) is
/// carried over for messages that keep their id.
pub fn replace_all(current: &[Message], incoming: Vec<Message>) -> Vec<Message> {
    let rendered: HashMap<&str, bool> = current
        .iter()
        .filter(|m| m.metadata.rendered)
        .map(|m| (m.id.as_str(), true))
        .collect();

    incoming
        .into_iter()
        .map(|mut message| {
            message.ensure_id();
            if rendered.contains_key(message.id.as_str()) {
                message.metadata.rendered = true;
            }
            message
        })
        .collect()
}

/// Position of a message in the projection
pub fn position(messages: &[Message], message_id: &str) -> Option<usize> {
    messages.iter().position(|m| m.id == message_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HumanTurn, Role, ToolCall};
    use serde_json::json;

    #[test]
    fn test_chunks_accumulate_by_id() {
        let mut messages = vec![Message::human(&HumanTurn::text("hi")).with_id("h")];
        append_chunk(&mut messages, Message::ai("Hel").with_id("a"));
        append_chunk(&mut messages, Message::ai("lo").with_id("a"));
        append_chunk(&mut messages, Message::ai("other").with_id("b"));

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].content, "Hello");
        assert_eq!(messages[2].content, "other");
    }

    #[test]
    fn test_chunk_tool_calls_deduplicated() {
        let call = ToolCall {
            id: Some("c1".into()),
            name: "python".into(),
            args: json!({"code": "1+1"}),
        };
        let mut first = Message::ai("").with_id("a");
        first.tool_calls.push(call.clone());
        let mut second = Message::ai("").with_id("a");
        second.tool_calls.push(call);

        let mut messages = Vec::new();
        append_chunk(&mut messages, first);
        append_chunk(&mut messages, second);
        assert_eq!(messages[0].tool_calls.len(), 1);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut messages = vec![
            Message::human(&HumanTurn::text("q")).with_id("h"),
            Message::ai("draft").with_id("a"),
        ];
        let mut server_copy = Message::new(Role::Human, "q (normalized)").with_id("h");
        server_copy.metadata.user_input = None;

        upsert(&mut messages, server_copy);
        upsert(&mut messages, Message::ai("final").with_id("a"));

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].display_text(), "q");
        assert_eq!(messages[1].content, "final");
    }

    #[test]
    fn test_replace_all_keeps_rendered_flag() {
        let mut shown = Message::ai("done").with_id("a");
        shown.metadata.rendered = true;

        let next = replace_all(&[shown], vec![Message::ai("done").with_id("a"), Message::ai("new").with_id("b")]);

        assert!(next[0].metadata.rendered);
        assert!(!next[1].metadata.rendered);
        assert_eq!(position(&next, "b"), Some(1));
    }
}
