//! Command routing logic for CLI

use crate::args::{Cli, Commands};
use crate::commands;
use anyhow::Context;
use threadline_core::config::{ConfigLoader, default_config_path};
use threadline_core::ClientConfig;

/// File, then environment, then command-line flags
pub fn load_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut loader = ConfigLoader::new().with_defaults();
    if let Some(path) = cli.config_file.clone().or_else(default_config_path) {
        loader = loader.with_file(path);
    }
    loader
        .with_env()
        .with_overlay(cli.overlay())
        .load()
        .context("failed to load configuration")
}

/// Route CLI commands to their respective handlers
pub async fn route(cli: Cli, config: ClientConfig) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Send {
            message,
            files,
            thread,
        }) => commands::send::execute(config, cli.verbose, message, files, thread).await,
        Some(Commands::History { thread, limit }) => {
            commands::history::execute(config, &thread, limit).await
        }
        Some(Commands::Chat { thread }) => commands::chat::execute(config, cli.verbose, thread).await,
        None => commands::chat::execute(config, cli.verbose, None).await,
    }
}
