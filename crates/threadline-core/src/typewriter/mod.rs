//! Incremental text reveal
//!
//! [`Typewriter`] is the per-message state machine; [`spawn_reveal`]
//! drives one on a timer and [`RevealRegistry`] keeps one per visible
//! message.

mod driver;
mod pacing;

pub use driver::{CompletionHook, PacingFactory, Reveal, RevealFrame, RevealRegistry, spawn_reveal};
pub use pacing::{FixedPacing, InstantPacing, Pacing, RandomPacing};

use crate::types::{Message, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealPhase {
    Idle,
    Revealing,
    Done,
}

/// Reveal state of one message's text
///
/// Completion is signalled exactly once per reveal, including reveals that
/// are complete from the start. [`restart`](Self::restart) re-arms it.
#[derive(Debug, Clone)]
pub struct Typewriter {
    text: String,
    /// Byte offset of the revealed prefix, always on a char boundary
    revealed: usize,
    phase: RevealPhase,
    animate: bool,
    completion_sent: bool,
    completion_pending: bool,
}

impl Typewriter {
    pub fn new(text: impl Into<String>, animate: bool) -> Self {
        let mut typewriter = Self {
            text: text.into(),
            revealed: 0,
            phase: RevealPhase::Idle,
            animate,
            completion_sent: false,
            completion_pending: false,
        };
        if !animate {
            typewriter.reveal_all();
        }
        typewriter
    }

    /// Only unrendered AI messages animate, plus human ones when forced
    pub fn for_message(message: &Message, force_reveal: bool) -> Self {
        let animate = !message.metadata.rendered
            && match message.role {
                Role::Ai => true,
                Role::Human => force_reveal,
                Role::Tool | Role::System => false,
            };
        Self::new(message.display_text(), animate)
    }

    pub fn phase(&self) -> RevealPhase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase == RevealPhase::Done
    }

    pub fn animates(&self) -> bool {
        self.animate
    }

    pub fn visible(&self) -> &str {
        &self.text[..self.revealed]
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Reveal up to `chars` more characters (at least one)
    pub fn tick(&mut self, chars: usize) -> RevealPhase {
        if self.phase == RevealPhase::Done {
            return self.phase;
        }
        self.phase = RevealPhase::Revealing;
        let rest = &self.text[self.revealed..];
        let advance = rest
            .char_indices()
            .nth(chars.max(1))
            .map_or(rest.len(), |(offset, _)| offset);
        self.revealed += advance;
        if self.revealed == self.text.len() {
            self.enter_done();
        }
        self.phase
    }

    /// Reveal everything now
    pub fn reveal_all(&mut self) {
        self.revealed = self.text.len();
        self.enter_done();
    }

    fn enter_done(&mut self) {
        self.phase = RevealPhase::Done;
        if !self.completion_sent {
            self.completion_sent = true;
            self.completion_pending = true;
        }
    }

    /// Take the completion signal; true exactly once per reveal
    pub fn take_completion(&mut self) -> bool {
        std::mem::take(&mut self.completion_pending)
    }

    /// Follow content that is still streaming in
    ///
    /// Text that extends the current one keeps the revealed prefix; any other
    /// change starts a new reveal from `Idle`.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text == self.text {
            return;
        }
        let replaced = !text.starts_with(self.visible());
        self.text = text;
        if replaced {
            self.restart();
        } else if !self.animate {
            self.reveal_all();
        } else if self.revealed < self.text.len() && self.phase == RevealPhase::Done {
            self.phase = RevealPhase::Revealing;
        }
    }

    /// Back to empty; completion will be signalled again
    pub fn restart(&mut self) {
        self.revealed = 0;
        self.phase = RevealPhase::Idle;
        self.completion_sent = false;
        self.completion_pending = false;
        if !self.animate {
            self.reveal_all();
        }
    }
}
