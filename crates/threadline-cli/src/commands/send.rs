//! One-shot message

use super::{Backend, attach};
use crate::console::CliConsole;
use crate::render;
use anyhow::bail;
use std::path::PathBuf;
use threadline_core::session::SessionOptions;
use threadline_core::{ClientConfig, Role};

pub async fn execute(
    config: ClientConfig,
    verbose: bool,
    message: String,
    files: Vec<PathBuf>,
    thread: Option<String>,
) -> anyhow::Result<()> {
    let backend = Backend::connect(config)?;
    let console = CliConsole::new(verbose);
    let session = backend.session(SessionOptions::from_config(backend.config()));
    let composer = backend.composer();

    if thread.is_some() {
        session.switch_thread(thread).await?;
    }
    let before = session.snapshot().messages.len();

    if !files.is_empty() {
        let attached = attach(&console, composer.uploads(), &files).await?;
        if attached < files.len() {
            bail!("{} of {} uploads failed", files.len() - attached, files.len());
        }
    }

    composer.send(&session, &message)?.wait().await;
    while let Some(handle) = composer.maybe_auto_approve(&session)? {
        console.info("Auto-approved tool call");
        handle.wait().await;
    }

    let snapshot = session.snapshot();
    for (index, message) in snapshot.messages.iter().enumerate().skip(before) {
        if message.role != Role::Human {
            console.line(&render::format_message(index + 1, message, None));
        }
    }
    if let Some(interrupt) = &snapshot.interrupt {
        console.warn(&render::describe_interrupt(interrupt));
    }
    if let Some(id) = &snapshot.thread_id {
        console.info(&format!("thread {}", id));
    }
    if let Some(error) = snapshot.error {
        bail!("run failed: {}", error);
    }
    if snapshot.disconnected {
        bail!("connection lost while the run was in progress");
    }
    Ok(())
}
