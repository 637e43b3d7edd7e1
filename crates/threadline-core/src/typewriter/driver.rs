//! Timer-driven reveals

use super::pacing::{Pacing, RandomPacing};
use super::{RevealPhase, Typewriter};
use crate::config::TypewriterConfig;
use crate::types::Message;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Called with the message id when its reveal completes
pub type CompletionHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Produces the pacing for each new reveal
pub type PacingFactory = Arc<dyn Fn() -> Box<dyn Pacing> + Send + Sync>;

/// What a renderer should show for one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealFrame {
    pub message_id: String,
    pub visible: String,
    pub phase: RevealPhase,
}

enum Control {
    Text(String),
    Restart,
}

/// A running reveal; dropping it cancels the timer
#[derive(Debug)]
pub struct Reveal {
    frames: watch::Receiver<RevealFrame>,
    control: mpsc::UnboundedSender<Control>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Reveal {
    pub fn frame(&self) -> RevealFrame {
        self.frames.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RevealFrame> {
        self.frames.clone()
    }

    /// Feed the latest streamed content
    pub fn update_text(&self, text: impl Into<String>) {
        let _ = self.control.send(Control::Text(text.into()));
    }

    pub fn restart(&self) {
        let _ = self.control.send(Control::Restart);
    }

    /// Stop pending ticks; the last frame stays as it is
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the current text to be fully revealed
    pub async fn wait_done(&self) -> RevealFrame {
        let mut frames = self.frames.clone();
        match frames.wait_for(|f| f.phase == RevealPhase::Done).await {
            Ok(frame) => frame.clone(),
            Err(_) => self.frame(),
        }
    }
}

impl Drop for Reveal {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start revealing `message` on the tokio timer
pub fn spawn_reveal(
    message: &Message,
    force_reveal: bool,
    mut pacing: Box<dyn Pacing>,
    on_complete: Option<CompletionHook>,
) -> Reveal {
    let message_id = message.id.clone();
    let mut typewriter = Typewriter::for_message(message, force_reveal);
    let (frames_tx, frames) = watch::channel(frame(&message_id, &typewriter));
    let (control, mut control_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let handle = tokio::spawn(async move {
        loop {
            if typewriter.take_completion() {
                tracing::trace!(message_id = %message_id, "reveal complete");
                if let Some(hook) = &on_complete {
                    hook(&message_id);
                }
            }
            frames_tx.send_replace(frame(&message_id, &typewriter));

            let command = if typewriter.is_done() {
                tokio::select! {
                    _ = token.cancelled() => break,
                    command = control_rx.recv() => match command {
                        Some(command) => Some(command),
                        None => break,
                    },
                }
            } else {
                let delay = pacing.delay();
                tokio::select! {
                    _ = token.cancelled() => break,
                    command = control_rx.recv() => match command {
                        Some(command) => Some(command),
                        None => break,
                    },
                    _ = tokio::time::sleep(delay) => {
                        typewriter.tick(pacing.chunk_size());
                        None
                    }
                }
            };

            match command {
                Some(Control::Text(text)) => typewriter.set_text(text),
                Some(Control::Restart) => typewriter.restart(),
                None => {}
            }
        }
    });

    Reveal {
        frames,
        control,
        cancel,
        handle,
    }
}

fn frame(message_id: &str, typewriter: &Typewriter) -> RevealFrame {
    RevealFrame {
        message_id: message_id.to_string(),
        visible: typewriter.visible().to_string(),
        phase: typewriter.phase(),
    }
}

/// One reveal per message id
///
/// Unknown ids get a new reveal, known ids receive content updates.
/// [`clear`](Self::clear) cancels everything, e.g. on a thread switch.
pub struct RevealRegistry {
    reveals: HashMap<String, Reveal>,
    pacing: PacingFactory,
    on_complete: Option<CompletionHook>,
    force_reveal: bool,
}

impl std::fmt::Debug for RevealRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevealRegistry")
            .field("reveals", &self.reveals.len())
            .field("force_reveal", &self.force_reveal)
            .finish()
    }
}

impl RevealRegistry {
    pub fn new(config: TypewriterConfig) -> Self {
        Self::with_pacing(Arc::new(move || -> Box<dyn Pacing> {
            Box::new(RandomPacing::new(config))
        }))
    }

    pub fn with_pacing(pacing: PacingFactory) -> Self {
        Self {
            reveals: HashMap::new(),
            pacing,
            on_complete: None,
            force_reveal: false,
        }
    }

    pub fn on_complete(mut self, hook: CompletionHook) -> Self {
        self.on_complete = Some(hook);
        self
    }

    /// Animate human messages as well
    pub fn force_reveal(mut self, force: bool) -> Self {
        self.force_reveal = force;
        self
    }

    /// Align reveals with the visible message list
    pub fn sync(&mut self, messages: &[Message]) {
        for message in messages {
            match self.reveals.get(&message.id) {
                Some(reveal) => reveal.update_text(message.display_text()),
                None => {
                    let reveal = spawn_reveal(
                        message,
                        self.force_reveal,
                        (self.pacing)(),
                        self.on_complete.clone(),
                    );
                    self.reveals.insert(message.id.clone(), reveal);
                }
            }
        }
        self.reveals
            .retain(|id, _| messages.iter().any(|m| &m.id == id));
    }

    pub fn get(&self, message_id: &str) -> Option<&Reveal> {
        self.reveals.get(message_id)
    }

    pub fn frame(&self, message_id: &str) -> Option<RevealFrame> {
        self.reveals.get(message_id).map(Reveal::frame)
    }

    /// Any reveal still animating
    pub fn is_revealing(&self) -> bool {
        self.reveals
            .values()
            .any(|r| r.frame().phase != RevealPhase::Done)
    }

    pub fn clear(&mut self) {
        for reveal in self.reveals.values() {
            reveal.cancel();
        }
        self.reveals.clear();
    }
}
