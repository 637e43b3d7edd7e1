//! Environment variable-based configuration loading

use super::model::{ConfigOverlay, TypewriterConfig};
use super::logging::LoggingConfig;
use crate::error::{ClientError, ClientResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

/// Prefix for all recognised variables
pub const ENV_PREFIX: &str = "THREADLINE_";

/// Load configuration from the process environment
pub fn load_from_env() -> ClientResult<ConfigOverlay> {
    load_from_vars(std::env::vars())
}

/// Load configuration from `THREADLINE_*` key/value pairs
pub fn load_from_vars<I, K, V>(vars: I) -> ClientResult<ConfigOverlay>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let vars: HashMap<String, String> = vars
        .into_iter()
        .filter_map(|(k, v)| {
            k.as_ref()
                .strip_prefix(ENV_PREFIX)
                .map(|name| (name.to_string(), v.into()))
        })
        .collect();

    let mut overlay = ConfigOverlay {
        api_url: vars.get("API_URL").cloned(),
        assistant_id: vars.get("ASSISTANT_ID").cloned(),
        upload_url: vars.get("UPLOAD_URL").cloned(),
        files_url: vars.get("FILES_URL").cloned(),
        ..Default::default()
    };

    if let Some(modes) = vars.get("STREAM_MODES") {
        overlay.stream_modes = Some(
            modes
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect(),
        );
    }
    overlay.auto_approve = parse_var(&vars, "AUTO_APPROVE")?;
    overlay.request_timeout_secs = parse_var(&vars, "REQUEST_TIMEOUT_SECS")?;

    let min_chunk = parse_var(&vars, "TYPEWRITER_MIN_CHUNK")?;
    let max_chunk = parse_var(&vars, "TYPEWRITER_MAX_CHUNK")?;
    let min_delay = parse_var(&vars, "TYPEWRITER_MIN_DELAY_MS")?;
    let max_delay = parse_var(&vars, "TYPEWRITER_MAX_DELAY_MS")?;
    if min_chunk.is_some() || max_chunk.is_some() || min_delay.is_some() || max_delay.is_some() {
        let defaults = TypewriterConfig::default();
        overlay.typewriter = Some(TypewriterConfig {
            min_chunk: min_chunk.unwrap_or(defaults.min_chunk),
            max_chunk: max_chunk.unwrap_or(defaults.max_chunk),
            min_delay_ms: min_delay.unwrap_or(defaults.min_delay_ms),
            max_delay_ms: max_delay.unwrap_or(defaults.max_delay_ms),
        });
    }

    let level = vars.get("LOG_LEVEL").cloned();
    let format = vars.get("LOG_FORMAT").cloned();
    let log_file = vars.get("LOG_FILE").map(PathBuf::from);
    if level.is_some() || format.is_some() || log_file.is_some() {
        let defaults = LoggingConfig::default();
        overlay.logging = Some(LoggingConfig {
            level: level.unwrap_or_default(),
            log_to_file: log_file.is_some() || defaults.log_to_file,
            log_file,
            log_to_console: defaults.log_to_console,
            format: format.unwrap_or_default(),
        });
    }

    Ok(overlay)
}

fn parse_var<T: FromStr>(vars: &HashMap<String, String>, name: &str) -> ClientResult<Option<T>> {
    vars.get(name)
        .map(|raw| {
            raw.trim().parse().map_err(|_| {
                ClientError::config(format!("Invalid {}{} value: '{}'", ENV_PREFIX, name, raw))
            })
        })
        .transpose()
}
