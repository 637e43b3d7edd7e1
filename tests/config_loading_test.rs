//! Configuration layering: defaults, file, environment-style vars, overlay

use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;
use threadline_core::ConfigLoader;
use threadline_core::config::ConfigOverlay;

#[test]
fn test_file_vars_and_overlay_layering() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
api_url = "http://file:2024"
assistant_id = "analyst"
auto_approve = false

[tool_labels]
python = "Code interpreter"

[logging]
level = "debug"
"#,
    )
    .unwrap();

    let mut vars = HashMap::new();
    vars.insert("THREADLINE_API_URL".to_string(), "http://env:2024".to_string());

    let config = ConfigLoader::new()
        .with_defaults()
        .with_file(&path)
        .with_vars(vars)
        .with_overlay(ConfigOverlay {
            auto_approve: Some(true),
            ..ConfigOverlay::default()
        })
        .load()
        .unwrap();

    assert_eq!(config.api_url, "http://env:2024");
    assert_eq!(config.assistant_id, "analyst");
    assert!(config.auto_approve);
    assert_eq!(config.tool_labels["python"], "Code interpreter");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.upload_endpoint(), "http://env:2024/upload");
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let config = ConfigLoader::new()
        .with_defaults()
        .with_file(dir.path().join("absent.toml"))
        .load()
        .unwrap();
    assert_eq!(config, threadline_core::ClientConfig::default());
}

#[test]
fn test_invalid_url_is_rejected() {
    let result = ConfigLoader::new()
        .with_overlay(ConfigOverlay {
            api_url: Some("not a url".to_string()),
            ..ConfigOverlay::default()
        })
        .load();
    assert!(result.is_err());
}
