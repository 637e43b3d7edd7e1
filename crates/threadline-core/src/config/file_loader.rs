//! File-based configuration loading

use super::model::ConfigOverlay;
use crate::error::{ClientError, ClientResult};
use std::fs;
use std::path::Path;

/// Load a configuration overlay from a file
///
/// Supports JSON, TOML, and YAML formats based on file extension.
/// A missing file yields an empty overlay.
pub fn load_from_file(path: &Path) -> ClientResult<ConfigOverlay> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, skipping");
        return Ok(ConfigOverlay::default());
    }

    let content = fs::read_to_string(path).map_err(|e| {
        ClientError::config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    let overlay = match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|e| {
            ClientError::config(format!("Failed to parse TOML config '{}': {}", path.display(), e))
        })?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|e| {
            ClientError::config(format!("Failed to parse YAML config '{}': {}", path.display(), e))
        })?,
        _ => serde_json::from_str(&content).map_err(|e| {
            ClientError::config(format!("Failed to parse JSON config '{}': {}", path.display(), e))
        })?,
    };

    Ok(overlay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_toml_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("threadline.toml");
        fs::write(
            &config_path,
            r#"
api_url = "https://agents.example.com"
auto_approve = true

[typewriter]
min_chunk = 5
max_chunk = 8

[progress_labels.create_meme]
text = "Drawing"
"#,
        )
        .unwrap();

        let overlay = load_from_file(&config_path).unwrap();
        assert_eq!(overlay.api_url.as_deref(), Some("https://agents.example.com"));
        assert_eq!(overlay.auto_approve, Some(true));
        let typewriter = overlay.typewriter.unwrap();
        assert_eq!(typewriter.min_chunk, 5);
        assert_eq!(typewriter.min_delay_ms, 20);
        assert_eq!(overlay.progress_labels.unwrap()["create_meme"]["text"], "Drawing");
    }

    #[test]
    fn test_load_from_yaml_and_json_files() {
        let temp_dir = TempDir::new().unwrap();

        let yaml_path = temp_dir.path().join("threadline.yaml");
        fs::write(&yaml_path, "assistant_id: research\nstream_modes: [values]\n").unwrap();
        let overlay = load_from_file(&yaml_path).unwrap();
        assert_eq!(overlay.assistant_id.as_deref(), Some("research"));
        assert_eq!(overlay.stream_modes, Some(vec!["values".to_string()]));

        let json_path = temp_dir.path().join("threadline.json");
        fs::write(&json_path, r#"{"request_timeout_secs": 30}"#).unwrap();
        let overlay = load_from_file(&json_path).unwrap();
        assert_eq!(overlay.request_timeout_secs, Some(30));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let overlay = load_from_file(Path::new("/nonexistent/threadline.toml")).unwrap();
        assert_eq!(overlay, ConfigOverlay::default());
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "api_url = [").unwrap();
        assert!(matches!(load_from_file(&config_path), Err(ClientError::Config(_))));
    }
}
