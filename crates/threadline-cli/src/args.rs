//! CLI argument definitions using clap
//!
//! - threadline chat [--thread <id>]          # Interactive conversation
//! - threadline send "message" [-f file]...   # One-shot message
//! - threadline history <thread>              # Print a thread's active branch

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use threadline_core::config::ConfigOverlay;

#[derive(Parser)]
#[command(name = "threadline")]
#[command(about = "Threadline - terminal client for streaming agent conversations")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (TOML, JSON or YAML)
    #[arg(long, global = true)]
    pub config_file: Option<PathBuf>,

    /// Agent backend base URL
    #[arg(long, global = true, env = "THREADLINE_API_URL")]
    pub api_url: Option<String>,

    /// Assistant (graph) to run
    #[arg(long, global = true)]
    pub assistant: Option<String>,

    /// Approve tool-use interrupts automatically
    #[arg(long, global = true)]
    pub auto_approve: bool,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Flags that override file and environment configuration
    pub fn overlay(&self) -> ConfigOverlay {
        ConfigOverlay {
            api_url: self.api_url.clone(),
            assistant_id: self.assistant.clone(),
            auto_approve: self.auto_approve.then_some(true),
            ..ConfigOverlay::default()
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive conversation (default)
    Chat {
        /// Continue an existing thread
        #[arg(long, short)]
        thread: Option<String>,
    },

    /// Send a single message and print the reply
    Send {
        /// Message text
        message: String,

        /// Files to attach
        #[arg(long = "file", short = 'f')]
        files: Vec<PathBuf>,

        /// Thread to continue; a new one is created otherwise
        #[arg(long, short)]
        thread: Option<String>,
    },

    /// Print the active branch of a thread
    History {
        thread: String,

        /// Checkpoints to fetch
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
}
