//! Tracing subscriber setup

use anyhow::Context;
use std::fs::OpenOptions;
use std::sync::Mutex;
use threadline_core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over the configured level. Console output
/// goes to stderr so it does not interleave with the conversation.
pub fn init(config: &LoggingConfig, verbose: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.directive(verbose)))
        .context("invalid log filter")?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if config.log_to_file {
        let path = config
            .resolved_log_file()
            .context("no log file location available")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
        match config.format.as_str() {
            "json" => builder.json().init(),
            _ => builder.init(),
        }
        return Ok(());
    }

    if !config.log_to_console {
        return Ok(());
    }
    let builder = builder.with_writer(std::io::stderr);
    match config.format.as_str() {
        "json" => builder.json().init(),
        "compact" => builder.compact().init(),
        _ => builder.init(),
    }
    Ok(())
}
