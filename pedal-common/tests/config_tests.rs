//! Configuration resolution against the real process environment
//!
//! Uses serial_test to prevent ENV variable race conditions: tests that set
//! PEDAL_ID_* variables are marked #[serial] so they never run in parallel.

use pedal_common::config::{env_vars, ConfigOverrides, ServiceConfig, TomlConfig};
use serial_test::serial;
use std::env;
use std::time::Duration;

fn clear_env() {
    for name in [
        env_vars::BIND_ADDRESS,
        env_vars::PORT,
        env_vars::API_BASE_URL,
        env_vars::MODEL,
        env_vars::API_KEY,
        env_vars::GOOGLE_API_KEY,
        env_vars::REQUEST_TIMEOUT_SECS,
        env_vars::MAX_IMAGE_BYTES,
        env_vars::LOG_LEVEL,
    ] {
        env::remove_var(name);
    }
}

fn overrides_with_config(path: std::path::PathBuf) -> ConfigOverrides {
    ConfigOverrides {
        config_path: Some(path),
        ..Default::default()
    }
}

#[test]
#[serial]
fn test_missing_config_file_uses_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();

    let config = ServiceConfig::resolve(&overrides_with_config(dir.path().join("absent.toml"))).unwrap();

    assert_eq!(config, ServiceConfig::default());
}

#[test]
#[serial]
fn test_invalid_config_file_is_ignored() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "port = [this is not toml").unwrap();

    let config = ServiceConfig::resolve(&overrides_with_config(path)).unwrap();

    assert_eq!(config.port, ServiceConfig::default().port);
}

#[test]
#[serial]
fn test_config_file_values_are_used() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        port = 6123
        api_key = "file-key"
        request_timeout_secs = 5
        "#,
    )
    .unwrap();

    let config = ServiceConfig::resolve(&overrides_with_config(path)).unwrap();

    assert_eq!(config.port, 6123);
    assert_eq!(config.vision.api_key.as_deref(), Some("file-key"));
    assert_eq!(config.vision.request_timeout, Duration::from_secs(5));
}

#[test]
#[serial]
fn test_environment_overrides_config_file() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "port = 6123\nmodel = \"file-model\"\n").unwrap();

    env::set_var(env_vars::PORT, "6200");
    env::set_var(env_vars::API_KEY, "env-key");
    env::set_var(env_vars::LOG_LEVEL, "debug");

    let config = ServiceConfig::resolve(&overrides_with_config(path)).unwrap();

    assert_eq!(config.port, 6200);
    assert_eq!(config.vision.model, "file-model");
    assert_eq!(config.vision.api_key.as_deref(), Some("env-key"));
    assert_eq!(config.log_level, "debug");

    clear_env();
}

#[test]
fn test_toml_config_round_trips_through_serde() {
    let config = TomlConfig {
        port: Some(5999),
        model: Some("gemini-2.0-flash".to_string()),
        ..Default::default()
    };

    let text = toml::to_string(&config).unwrap();
    assert_eq!(TomlConfig::parse(&text).unwrap(), config);
}
