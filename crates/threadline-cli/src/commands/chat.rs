//! Interactive conversation loop

use super::{Backend, attach};
use crate::console::CliConsole;
use crate::render::{self, Transcript};
use anyhow::{Context, anyhow, bail};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use threadline_core::artifacts::ArtifactRef;
use threadline_core::session::{RunHandle, SessionOptions, SessionSnapshot};
use threadline_core::typewriter::RevealRegistry;
use threadline_core::{
    AgentProgress, ArtifactResolver, BranchNavigator, ClientConfig, CompositionContext,
    MessageReconciler, Role, SessionManager,
};
use tokio::io::{AsyncBufReadExt, BufReader};

const FRAME_INTERVAL: Duration = Duration::from_millis(30);

const HELP: &str = "\
Type a message and press enter to send it. While the agent waits for
approval, plain text declines with a comment.

  /attach <path>...        upload files for the next message
  /files                   list attachments and selected artifacts
  /detach <n>              remove attachment n
  /select <id> [label]     toggle an artifact in the selection
  /approve                 approve the pending tool call
  /comment <text>          decline the pending tool call with a comment
  /retry                   resubmit after a failed run
  /rejoin                  reattach to a run whose stream dropped
  /regen [n]               regenerate message n (default: last reply)
  /edit <n> <text>         rewrite human message n and branch from it
  /branch prev|next [n]    switch the branch at message n
  /artifacts [n]           resolve artifacts of message n (default: all)
  /show                    print the active branch
  /thread [id]             show the thread id or switch threads
  /new                     start a fresh thread
  /quit                    exit";

enum Flow {
    Continue,
    Quit,
}

pub async fn execute(config: ClientConfig, verbose: bool, thread: Option<String>) -> anyhow::Result<()> {
    let backend = Backend::connect(config)?;
    let mut chat = Chat::new(&backend, verbose);

    chat.console.print_header("Threadline");
    chat.console.line("Type /help for commands.");
    if thread.is_some() {
        chat.switch(thread).await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        chat.console.prompt("›");
        let Some(line) = lines.next_line().await.context("reading input")? else {
            break;
        };
        match chat.handle(line.trim()).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(error) => chat.console.error(&format!("{:#}", error)),
        }
    }
    chat.reveals.clear();
    Ok(())
}

struct Chat {
    session: SessionManager,
    composer: CompositionContext,
    resolver: ArtifactResolver,
    progress: AgentProgress,
    reconciler: MessageReconciler,
    reveals: RevealRegistry,
    transcript: Transcript,
    console: CliConsole,
}

impl Chat {
    fn new(backend: &Backend, verbose: bool) -> Self {
        let config = backend.config();
        let session = backend.session(SessionOptions::from_config(config));
        let rendered = session.clone();
        let reveals = RevealRegistry::new(config.typewriter)
            .on_complete(Arc::new(move |id: &str| rendered.mark_rendered(id)));
        Self {
            composer: backend.composer(),
            resolver: backend.resolver(),
            progress: AgentProgress::from_config(config),
            reconciler: MessageReconciler::new(),
            reveals,
            transcript: Transcript::new(),
            console: CliConsole::new(verbose),
            session,
        }
    }

    async fn handle(&mut self, line: &str) -> anyhow::Result<Flow> {
        if line.is_empty() {
            return Ok(Flow::Continue);
        }
        let Some(command) = line.strip_prefix('/') else {
            let handle = if self.session.interrupt().is_some() {
                self.composer.continue_interrupt(&self.session, line)?
            } else {
                Some(self.composer.send(&self.session, line)?)
            };
            if let Some(handle) = handle {
                self.follow(handle).await;
            }
            return Ok(Flow::Continue);
        };

        let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
        let rest = rest.trim();
        match name {
            "help" => self.console.line(HELP),
            "quit" | "exit" => return Ok(Flow::Quit),
            "attach" => {
                let paths: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
                if paths.is_empty() {
                    bail!("usage: /attach <path>...");
                }
                let done = attach(&self.console, self.composer.uploads(), &paths).await?;
                self.console.success(&format!("{} file(s) attached", done));
            }
            "files" => self.list_attachments(),
            "detach" => {
                let index = parse_index(rest)?;
                if !self.composer.uploads().remove_item(index - 1) {
                    bail!("no attachment {}", index);
                }
            }
            "select" => {
                let (id, label) = match rest.split_once(' ') {
                    Some((id, label)) => (id, Some(label.trim().to_string())),
                    None => (rest, None),
                };
                if id.is_empty() {
                    bail!("usage: /select <id> [label]");
                }
                let selected = self.composer.selection().toggle(id, label);
                self.console
                    .info(&format!("{} {}", id, if selected { "selected" } else { "deselected" }));
            }
            "approve" => match self.composer.continue_interrupt(&self.session, "")? {
                Some(handle) => self.follow(handle).await,
                None => self.console.warn("Nothing to approve"),
            },
            "comment" => {
                if rest.is_empty() {
                    bail!("usage: /comment <text>");
                }
                match self.composer.continue_interrupt(&self.session, rest)? {
                    Some(handle) => self.follow(handle).await,
                    None => self.console.warn("Nothing to answer"),
                }
            }
            "retry" => {
                let handle = self.session.resubmit_last()?;
                self.follow(handle).await;
            }
            "rejoin" => {
                let handle = self.session.rejoin()?;
                self.follow(handle).await;
            }
            "regen" => {
                let id = self.message_id(rest, |role| role == Role::Ai)?;
                let handle = self.session.regenerate(&id)?;
                self.transcript.skip(self.reconciler.messages());
                self.follow(handle).await;
            }
            "edit" => {
                let (index, text) = rest.split_once(' ').ok_or_else(|| anyhow!("usage: /edit <n> <text>"))?;
                let id = self.message_id(index, |role| role == Role::Human)?;
                let mut edit = self.composer.begin_edit(&self.session, &id)?;
                edit.set_text(text.trim());
                let handle = edit.commit(&self.session)?;
                self.follow(handle).await;
            }
            "branch" => {
                let (direction, index) = rest.split_once(' ').unwrap_or((rest, ""));
                self.switch_branch(direction, index.trim())?;
            }
            "artifacts" => self.show_artifacts(rest).await?,
            "show" => self.show_history(),
            "thread" => {
                if rest.is_empty() {
                    match self.session.thread_id() {
                        Some(id) => self.console.line(&id),
                        None => self.console.line("(new thread, nothing sent yet)"),
                    }
                } else {
                    self.switch(Some(rest.to_string())).await?;
                }
            }
            "new" => {
                self.switch(None).await?;
                self.console.success("Started a new thread");
            }
            other => bail!("unknown command /{}; try /help", other),
        }
        Ok(Flow::Continue)
    }

    /// Render a run until it ends, then keep approving while auto-approve applies
    async fn follow(&mut self, handle: RunHandle) {
        let mut handle = handle;
        loop {
            let snapshot = self.follow_once(handle).await;
            self.report(&snapshot);
            match self.composer.maybe_auto_approve(&self.session) {
                Ok(Some(next)) => {
                    self.console.info("Auto-approved tool call");
                    handle = next;
                }
                Ok(None) => break,
                Err(error) => {
                    self.console.error(&error.to_string());
                    break;
                }
            }
        }
    }

    async fn follow_once(&mut self, handle: RunHandle) -> SessionSnapshot {
        let mut ticker = tokio::time::interval(FRAME_INTERVAL);
        let snapshot = loop {
            ticker.tick().await;
            let finished = handle.is_finished();
            let snapshot = self.session.snapshot();
            self.render(&snapshot);
            if finished && !self.reveals.is_revealing() {
                // a run that ended mid-message leaves the line open
                let tail = self.transcript.flush();
                self.console.write(&tail);
                break snapshot;
            }
        };
        handle.wait().await;
        self.console.set_activity(None);
        snapshot
    }

    fn render(&mut self, snapshot: &SessionSnapshot) {
        self.reconciler.reconcile(snapshot);
        let messages = self.reconciler.messages().to_vec();
        self.reveals.sync(&messages);

        let reveals = &self.reveals;
        let out = self
            .transcript
            .advance(&messages, |id| reveals.frame(id), snapshot.is_loading);

        let activity = self.activity(snapshot);
        if !self.transcript.is_idle() || !out.is_empty() {
            self.console.set_activity(None);
        }
        self.console.write(&out);
        if self.transcript.is_idle() {
            self.console.set_activity(activity.as_deref());
        }
    }

    fn activity(&self, snapshot: &SessionSnapshot) -> Option<String> {
        if !snapshot.is_loading || snapshot.disconnected {
            return None;
        }
        if let Some(tool) = self.progress.executing_tool(snapshot) {
            return Some(format!("Running {}", tool.label.unwrap_or(tool.name)));
        }
        if let Some(label) = self.progress.label(snapshot) {
            return Some(label.to_string());
        }
        Some("Thinking".to_string())
    }

    fn report(&self, snapshot: &SessionSnapshot) {
        if let Some(interrupt) = &snapshot.interrupt {
            self.console.warn(&render::describe_interrupt(interrupt));
        }
        if snapshot.disconnected {
            self.console
                .warn("Connection lost. The run may still be going; /rejoin to follow it.");
        }
        if let Some(error) = &snapshot.error {
            self.console.error(&error.message);
            self.console.line("/retry to resubmit.");
        }
    }

    /// Reset every thread-scoped piece of state and load `thread_id`
    async fn switch(&mut self, thread_id: Option<String>) -> anyhow::Result<()> {
        self.composer.reset();
        self.reveals.clear();
        self.transcript.clear();
        self.reconciler.reset();
        let loading = thread_id.is_some();
        self.session.switch_thread(thread_id).await?;
        if loading {
            self.show_history();
        }
        Ok(())
    }

    fn show_history(&mut self) {
        let snapshot = self.session.snapshot();
        self.reconciler.reconcile(&snapshot);
        if let Some(id) = &snapshot.thread_id {
            self.console.print_header(&format!("Thread {}", id));
        }
        for (index, message) in self.reconciler.messages().iter().enumerate() {
            self.console
                .line(&render::format_message(index + 1, message, snapshot.branch(&message.id)));
        }
        self.transcript.skip(self.reconciler.messages());
        self.report(&snapshot);
    }

    fn list_attachments(&self) {
        let items = self.composer.uploads().items();
        if items.is_empty() {
            self.console.line("No attachments");
        }
        for (index, item) in items.iter().enumerate() {
            let state = match item.data {
                Some(_) => "ready".to_string(),
                None => format!("{}%", item.progress),
            };
            self.console.line(&format!("[{}] {} ({})", index + 1, item.name, state));
        }
        let selection = self.composer.selection().snapshot();
        for (id, entry) in &selection {
            let label = entry.label.as_deref().unwrap_or("");
            self.console.line(&format!("◆ {} {}", id, label));
        }
    }

    /// Message id for a 1-based index, or the last message matching `role`
    fn message_id(&self, index: &str, role: impl Fn(Role) -> bool) -> anyhow::Result<String> {
        let messages = self.reconciler.messages();
        let message = if index.is_empty() {
            messages.iter().rev().find(|m| role(m.role))
        } else {
            messages.get(parse_index(index)? - 1).filter(|m| role(m.role))
        };
        message
            .map(|m| m.id.clone())
            .ok_or_else(|| anyhow!("no matching message; /show lists them"))
    }

    fn switch_branch(&mut self, direction: &str, index: &str) -> anyhow::Result<()> {
        let snapshot = self.session.snapshot();
        let navigator = if index.is_empty() {
            self.reconciler
                .messages()
                .iter()
                .rev()
                .filter_map(|m| BranchNavigator::new(snapshot.branch(&m.id)))
                .find(BranchNavigator::has_alternatives)
        } else {
            let id = self.message_id(index, |_| true)?;
            BranchNavigator::new(snapshot.branch(&id))
        };
        let navigator = navigator.ok_or_else(|| anyhow!("no alternative branches here"))?;

        let moved = match direction {
            "prev" => navigator.go_previous(&self.session)?,
            "next" => navigator.go_next(&self.session)?,
            _ => bail!("usage: /branch prev|next [n]"),
        };
        if !moved {
            self.console.warn(&format!("Already at branch {}", navigator.label()));
            return Ok(());
        }
        self.transcript.clear();
        self.reconciler.reset();
        self.show_history();
        Ok(())
    }

    async fn show_artifacts(&self, index: &str) -> anyhow::Result<()> {
        let messages = self.reconciler.messages();
        let scope = if index.is_empty() {
            messages
        } else {
            let position = parse_index(index)? - 1;
            messages
                .get(position..=position)
                .ok_or_else(|| anyhow!("no message {}", index))?
        };
        let references: Vec<ArtifactRef> = scope
            .iter()
            .flat_map(|m| ArtifactRef::find_all(&m.content))
            .collect();
        if references.is_empty() {
            self.console.line("No artifacts");
        }
        for reference in references {
            let view = self.resolver.resolve(&reference).await;
            self.console.line(&render::describe_view(&reference, &view));
        }
        Ok(())
    }
}

fn parse_index(text: &str) -> anyhow::Result<usize> {
    match text.trim().parse::<usize>() {
        Ok(index) if index > 0 => Ok(index),
        _ => bail!("expected a positive number, got {:?}", text),
    }
}
