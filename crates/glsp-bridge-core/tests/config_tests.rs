//! Configuration integration tests.
//!
//! Tests for configuration loading and merging from a project directory.

use glsp_bridge_core::config::{Config, LogLevel};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test that config loads from project directory.
#[tokio::test]
async fn test_load_project_config() {
    let temp = TempDir::new().expect("Failed to create temp dir");

    let config_content = r#"{
        "diagramType": "workflow-diagram",
        "server": { "jarPath": "/opt/glsp/server.jar", "port": 5100 }
    }"#;

    fs::write(temp.path().join("glsp-bridge.json"), config_content)
        .expect("Failed to write config");

    let (config, sources) = Config::load(Some(temp.path()))
        .await
        .expect("Failed to load config");

    assert_eq!(config.diagram_type, Some("workflow-diagram".to_string()));
    let server = config.server();
    assert_eq!(server.jar_path, Some(PathBuf::from("/opt/glsp/server.jar")));
    assert!(sources.contains(&temp.path().join("glsp-bridge.json")));
}

/// Test that JSONC comments are handled.
#[tokio::test]
async fn test_load_jsonc_config() {
    let temp = TempDir::new().expect("Failed to create temp dir");

    let config_content = r#"{
        // Diagram served by this bridge
        "diagramType": "workflow-diagram",
        /* Multi-line
           comment */
        "logLevel": "debug",
        "logging": true
    }"#;

    fs::write(temp.path().join("glsp-bridge.jsonc"), config_content)
        .expect("Failed to write config");

    let (config, _) = Config::load(Some(temp.path()))
        .await
        .expect("Failed to load config");

    assert_eq!(config.diagram_type, Some("workflow-diagram".to_string()));
    assert_eq!(config.log_level, Some(LogLevel::Debug));
    assert_eq!(config.logging, Some(true));
}

/// `.jsonc` wins over `.json` in the same directory.
#[tokio::test]
async fn test_jsonc_preferred_over_json() {
    let temp = TempDir::new().expect("Failed to create temp dir");

    fs::write(
        temp.path().join("glsp-bridge.jsonc"),
        r#"{ "diagramType": "from-jsonc" }"#,
    )
    .expect("Failed to write config");
    fs::write(
        temp.path().join("glsp-bridge.json"),
        r#"{ "diagramType": "from-json" }"#,
    )
    .expect("Failed to write config");

    let (config, sources) = Config::load(Some(temp.path()))
        .await
        .expect("Failed to load config");

    assert_eq!(config.diagram_type, Some("from-jsonc".to_string()));
    assert!(!sources.contains(&temp.path().join("glsp-bridge.json")));
}

/// Test default config when no file exists.
#[tokio::test]
async fn test_no_project_config() {
    let temp = TempDir::new().expect("Failed to create temp dir");

    let (_, sources) = Config::load(Some(temp.path()))
        .await
        .expect("Failed to load config");

    // A global config might exist, but no project config should be found.
    assert!(sources.iter().all(|s| !s.starts_with(temp.path())));
}

/// Test that invalid JSON is reported, not ignored.
#[tokio::test]
async fn test_invalid_project_config() {
    let temp = TempDir::new().expect("Failed to create temp dir");

    fs::write(temp.path().join("glsp-bridge.json"), "{ \"diagramType\": ")
        .expect("Failed to write config");

    let result = Config::load(Some(temp.path())).await;
    assert!(result.is_err());
}

/// Test `{file:...}` substitution relative to the config file.
#[tokio::test]
async fn test_file_substitution() {
    let temp = TempDir::new().expect("Failed to create temp dir");

    fs::write(temp.path().join("diagram-type.txt"), "workflow-diagram")
        .expect("Failed to write file");
    fs::write(
        temp.path().join("glsp-bridge.json"),
        r#"{ "diagramType": "{file:diagram-type.txt}" }"#,
    )
    .expect("Failed to write config");

    let (config, _) = Config::load(Some(temp.path()))
        .await
        .expect("Failed to load config");

    assert_eq!(config.diagram_type, Some("workflow-diagram".to_string()));
}
