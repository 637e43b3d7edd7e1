//! Print a thread's active branch

use super::Backend;
use crate::console::CliConsole;
use crate::render;
use threadline_core::session::SessionOptions;
use threadline_core::ClientConfig;

pub async fn execute(config: ClientConfig, thread: &str, limit: usize) -> anyhow::Result<()> {
    let backend = Backend::connect(config)?;
    let options = SessionOptions {
        history_limit: limit,
        ..SessionOptions::from_config(backend.config())
    };
    let session = backend.session(options);
    session.switch_thread(Some(thread.to_string())).await?;

    let console = CliConsole::new(false);
    let snapshot = session.snapshot();
    console.print_header(&format!("Thread {}", thread));
    for (index, message) in snapshot.messages.iter().enumerate() {
        console.line(&render::format_message(index + 1, message, snapshot.branch(&message.id)));
    }
    if let Some(interrupt) = &snapshot.interrupt {
        console.warn(&render::describe_interrupt(interrupt));
    }
    Ok(())
}
