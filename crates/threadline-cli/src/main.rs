//! Threadline command-line client
//!
//! A terminal front end for streaming, branching agent conversations.
//!
//! # Modes
//!
//! ## Chat (default)
//! A conversation loop with live typewriter output, attachments, interrupt
//! approval, regeneration, message editing and branch switching.
//!
//! - **Command:** `threadline` or `threadline chat --thread <id>`
//!
//! ## Send (one-shot)
//! Submit a single message, wait for the run and print the reply.
//!
//! - **Command:** `threadline send "Summarize data.csv" -f data.csv`
//!
//! ## History
//! Print the active branch of an existing thread.
//!
//! - **Command:** `threadline history <thread-id>`
//!
//! Configuration is read from `~/.config/threadline/config.toml` (or
//! `--config-file`), then `THREADLINE_*` environment variables, then flags.

mod args;
mod commands;
mod console;
mod logging;
mod render;
mod router;

use clap::Parser;

pub use args::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = router::load_config(&cli)?;
    logging::init(&config.logging, cli.verbose)?;

    if let Err(error) = router::route(cli, config).await {
        console::CliConsole::new(true).error(&format!("{:#}", error));
        std::process::exit(1);
    }
    Ok(())
}
