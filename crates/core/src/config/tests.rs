//! Tests for configuration module

use super::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn create_temp_config_file(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn from_toml_str_full() {
    let toml = r#"
        [backend]
        provider = "http"
        endpoint = "https://abc123.us-east-1.aoss.amazonaws.com"
        api_token = "secret"
        request_timeout_ms = 10000

        [reconciler]
        base_delay_secs = 2
        max_delay_secs = 20
        default_service_timeout_secs = 120
    "#;

    let config = Config::from_toml_str(toml).unwrap();
    assert_eq!(
        config.backend.endpoint,
        "https://abc123.us-east-1.aoss.amazonaws.com"
    );
    assert_eq!(config.backend.api_token.as_deref(), Some("secret"));
    assert_eq!(config.backend.request_timeout_ms, 10000);
    assert_eq!(config.reconciler.base_delay_secs, 2);
    assert_eq!(config.reconciler.max_delay_secs, 20);
    assert_eq!(config.reconciler.default_service_timeout_secs, 120);
}

#[test]
fn from_toml_str_applies_defaults_for_missing_sections() {
    let config = Config::from_toml_str("").unwrap();
    assert_eq!(config.backend.provider, "http");
    assert_eq!(config.backend.endpoint, "http://localhost:9200");
    assert_eq!(config.reconciler.base_delay_secs, 5);
    assert_eq!(config.reconciler.max_delay_secs, 60);
}

#[test]
fn control_endpoint_falls_back_to_data_plane() {
    let mut config = Config::default();
    assert_eq!(config.backend.control_endpoint(), config.backend.endpoint);

    config.backend.control_endpoint = Some("https://aoss.us-east-1.amazonaws.com".to_string());
    assert_eq!(
        config.backend.control_endpoint(),
        "https://aoss.us-east-1.amazonaws.com"
    );
}

#[test]
fn from_toml_str_rejects_unknown_provider() {
    let toml = r#"
        [backend]
        provider = "dynamo"
    "#;
    let err = Config::from_toml_str(toml).unwrap_err();
    assert!(err.to_string().contains("Invalid backend provider"));
}

#[test]
fn from_toml_str_rejects_inverted_delays() {
    let toml = r#"
        [reconciler]
        base_delay_secs = 30
        max_delay_secs = 10
    "#;
    assert!(Config::from_toml_str(toml).is_err());
}

#[test]
fn from_file_reads_toml() {
    let file = create_temp_config_file(
        r#"
        [backend]
        endpoint = "http://search.internal:9200"
        "#,
    );
    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.backend.endpoint, "http://search.internal:9200");
}

#[test]
fn from_file_missing_path_yields_defaults() {
    let config = Config::from_file(std::path::Path::new("/nonexistent/ossindex.toml")).unwrap();
    assert_eq!(config.backend.provider, "http");
}
