//! Logging configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to log to file
    pub log_to_file: bool,
    /// Log file path
    pub log_file: Option<PathBuf>,
    /// Whether to log to console
    pub log_to_console: bool,
    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file: None,
            log_to_console: true,
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Merge with another logging config
    pub fn merge(&mut self, other: LoggingConfig) {
        if !other.level.is_empty() {
            self.level = other.level;
        }

        self.log_to_file = other.log_to_file;

        if other.log_file.is_some() {
            self.log_file = other.log_file;
        }

        self.log_to_console = other.log_to_console;

        if !other.format.is_empty() {
            self.format = other.format;
        }
    }

    /// Filter directive for the subscriber; `verbose` raises the workspace crates to debug
    pub fn directive(&self, verbose: bool) -> &str {
        if verbose {
            "threadline_core=debug,threadline_cli=debug,info"
        } else if self.level.trim().is_empty() {
            "info"
        } else {
            self.level.trim()
        }
    }

    /// Default log file under the user's data directory
    pub fn resolved_log_file(&self) -> Option<PathBuf> {
        self.log_file
            .clone()
            .or_else(|| dirs::data_local_dir().map(|d| d.join("threadline").join("threadline.log")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_prefers_verbose() {
        let config = LoggingConfig::default();
        assert_eq!(config.directive(false), "info");
        assert_eq!(config.directive(true), "threadline_core=debug,threadline_cli=debug,info");

        let quiet = LoggingConfig {
            level: "  ".to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(quiet.directive(false), "info");
    }

    #[test]
    fn test_logging_config_merge_keeps_non_empty_strings() {
        let mut config = LoggingConfig::default();
        config.merge(LoggingConfig {
            level: String::new(),
            log_to_file: true,
            log_file: Some(PathBuf::from("/tmp/threadline.log")),
            log_to_console: false,
            format: "json".to_string(),
        });

        assert_eq!(config.level, "info");
        assert_eq!(config.format, "json");
        assert!(config.log_to_file);
        assert!(!config.log_to_console);
        assert_eq!(config.resolved_log_file(), Some(PathBuf::from("/tmp/threadline.log")));
    }
}
