//! Text rendering of messages, interrupts and artifacts

use colored::*;
use std::collections::HashSet;
use threadline_core::artifacts::{ArtifactRef, ArtifactView};
use threadline_core::session::BranchMeta;
use threadline_core::typewriter::{RevealFrame, RevealPhase};
use threadline_core::{BranchNavigator, Interrupt, Message, Role};

const TOOL_OUTPUT_LINES: usize = 6;

pub fn role_label(role: Role) -> ColoredString {
    match role {
        Role::Human => "you".cyan().bold(),
        Role::Ai => "agent".green().bold(),
        Role::Tool => "tool".magenta(),
        Role::System => "system".dimmed(),
    }
}

/// Full rendering of one message, used for history listings
pub fn format_message(index: usize, message: &Message, branch: Option<&BranchMeta>) -> String {
    let mut out = format!("{} {} › ", format!("[{}]", index).dimmed(), role_label(message.role));
    match message.role {
        Role::Tool => out.push_str(&truncate_lines(message.display_text()).dimmed().to_string()),
        _ => out.push_str(message.display_text()),
    }
    out.push_str(&format_footer(message, branch));
    out
}

/// Attachments, tool calls, artifacts and the branch switcher of a message
pub fn format_footer(message: &Message, branch: Option<&BranchMeta>) -> String {
    let mut out = String::new();
    for file in &message.metadata.files {
        out.push_str(&format!("\n    📎 {}", file.display_name()));
    }
    if !message.metadata.selected.is_empty() {
        let selected: Vec<&str> = message.metadata.selected.keys().map(String::as_str).collect();
        out.push_str(&format!("\n    ◆ {}", selected.join(", ")).dimmed().to_string());
    }
    for call in &message.tool_calls {
        out.push_str(&format!("\n    🔧 {}", call.name.magenta()));
    }
    for reference in ArtifactRef::find_all(&message.content) {
        out.push_str(&format!("\n    ▣ {}", reference).blue().to_string());
    }
    if let Some(navigator) = BranchNavigator::new(branch).filter(BranchNavigator::has_alternatives) {
        out.push_str(&format!("\n    ‹ {} ›", navigator.label()).yellow().to_string());
    }
    out
}

pub fn describe_interrupt(interrupt: &Interrupt) -> String {
    let tool = interrupt
        .payload
        .extra
        .get("tool")
        .and_then(|v| v.as_str())
        .unwrap_or("a tool");
    if interrupt.is_approval() {
        format!(
            "The agent wants to run {}. /approve to continue or /comment <text> to decline.",
            tool
        )
    } else {
        format!(
            "The agent is waiting for input ({}). Reply with /comment <text> or /approve.",
            interrupt.payload.kind
        )
    }
}

pub fn describe_view(reference: &ArtifactRef, view: &ArtifactView) -> String {
    let detail = match view {
        ArtifactView::Image { mime, data } => format!("{} image, {} bytes base64", mime, data.len()),
        ArtifactView::Plot(figure) => {
            let traces = figure
                .get("data")
                .and_then(|d| d.as_array())
                .map_or(0, Vec::len);
            format!("plot with {} trace(s)", traces)
        }
        ArtifactView::Audio { data } => format!("audio clip, {} bytes base64", data.len()),
        ArtifactView::Html { url } => format!("open {}", url),
        ArtifactView::Unsupported { mime } => format!("unsupported type {}", mime),
        ArtifactView::Unavailable { message } => message.red().to_string(),
    };
    format!("{} {}", reference.to_string().blue().bold(), detail)
}

fn truncate_lines(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().take(TOOL_OUTPUT_LINES).collect();
    if text.lines().count() > TOOL_OUTPUT_LINES {
        lines.push("…");
    }
    lines.join("\n      ")
}

/// Incremental printer for a live conversation
///
/// Messages are printed strictly in order; the next one starts only after
/// the current one is fully revealed and no longer streaming.
#[derive(Debug, Default)]
pub struct Transcript {
    finished: HashSet<String>,
    current: Option<(String, String)>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat these messages as already printed
    pub fn skip<'a>(&mut self, messages: impl IntoIterator<Item = &'a Message>) {
        self.finished.extend(messages.into_iter().map(|m| m.id.clone()));
    }

    pub fn clear(&mut self) {
        self.finished.clear();
        self.current = None;
    }

    /// No message is partially printed
    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    /// Text to write for the progress made since the previous call
    ///
    /// `frame` yields the reveal state of a message; messages without one
    /// are shown in full. `streaming` marks that the last message may still
    /// grow.
    pub fn advance<F>(&mut self, messages: &[Message], frame: F, streaming: bool) -> String
    where
        F: Fn(&str) -> Option<RevealFrame>,
    {
        let mut out = String::new();
        for (position, message) in messages.iter().enumerate() {
            if self.finished.contains(&message.id) {
                continue;
            }
            if message.role == Role::Human {
                self.finished.insert(message.id.clone());
                continue;
            }

            let (visible, phase) = match frame(&message.id) {
                Some(frame) => (frame.visible, frame.phase),
                None => (message.display_text().to_string(), RevealPhase::Done),
            };
            let visible = match message.role {
                Role::Tool => truncate_lines(&visible).dimmed().to_string(),
                _ => visible,
            };

            let printed = match self.current.take() {
                Some((id, printed)) if id == message.id => printed,
                _ => {
                    out.push_str(&format!("{} › ", role_label(message.role)));
                    String::new()
                }
            };
            if visible.starts_with(printed.as_str()) {
                out.push_str(&visible[printed.len()..]);
            } else {
                out.push_str(&format!("\n{} › {}", role_label(message.role), visible));
            }
            self.current = Some((message.id.clone(), visible));

            let still_growing = streaming && position + 1 == messages.len();
            if phase != RevealPhase::Done || still_growing {
                break;
            }
            out.push_str(&format_footer(message, None));
            out.push('\n');
            self.finished.insert(message.id.clone());
            self.current = None;
        }
        out
    }

    /// Close a partially printed message, e.g. when the run ended early
    pub fn flush(&mut self) -> String {
        match self.current.take() {
            Some((id, _)) => {
                self.finished.insert(id);
                "\n".to_string()
            }
            None => String::new(),
        }
    }
}
