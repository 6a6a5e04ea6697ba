//! Loading configuration from files and environment overrides

use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;
use tiercache_core::config::{ConfigLoader, ConfigurationError};
use tiercache_core::CacheEngine;

const BASE: &str = r#"
[remote]
backend = "memory"
operation_timeout_ms = 1500

[[namespaces]]
name = "loan"
max_local_entries = 50
local_ttl_seconds = 60
remote_ttl_seconds = 600

[[namespaces]]
name = "payment"
max_local_entries = 20
local_ttl_seconds = 30
remote_ttl_seconds = 300
"#;

fn write_config(dir: &TempDir, name: &str, contents: &str) {
    fs::write(dir.path().join(name), contents).expect("write config file");
}

#[test]
fn test_environment_overlay_wins_over_base() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "tiercache.toml", BASE);
    write_config(
        &dir,
        "tiercache.staging.toml",
        r#"
        [remote]
        operation_timeout_ms = 250

        [circuit_breaker]
        cooldown_seconds = 45
        "#,
    );

    let config = ConfigLoader::load_from_directory_with_env(dir.path(), "staging").unwrap();

    assert_eq!(config.remote.operation_timeout_ms, 250);
    assert_eq!(config.circuit_breaker.cooldown_seconds, 45);
    assert_eq!(config.namespaces.len(), 2);
    assert_eq!(config.namespaces[0].name, "loan");
}

#[test]
fn test_missing_overlay_uses_base_only() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "tiercache.toml", BASE);

    let config = ConfigLoader::load_from_directory_with_env(dir.path(), "production").unwrap();
    assert_eq!(config.remote.operation_timeout_ms, 1500);
}

#[test]
fn test_overrides_use_prefixed_keys() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "tiercache.toml", BASE);

    let overrides = HashMap::from([
        (
            "TIERCACHE__REMOTE__OPERATION_TIMEOUT_MS".to_string(),
            "750".to_string(),
        ),
        (
            "TIERCACHE__HEALTH__MIN_HIT_RATE".to_string(),
            "0.8".to_string(),
        ),
    ]);
    let config =
        ConfigLoader::load_file_with_overrides(dir.path().join("tiercache.toml"), Some(overrides))
            .unwrap();

    assert_eq!(config.remote.operation_timeout_ms, 750);
    assert!((config.health.min_hit_rate - 0.8).abs() < f64::EPSILON);
}

#[test]
fn test_duplicate_namespace_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        "tiercache.toml",
        r#"
        [[namespaces]]
        name = "loan"
        max_local_entries = 10
        local_ttl_seconds = 60
        remote_ttl_seconds = 60

        [[namespaces]]
        name = "loan"
        max_local_entries = 20
        local_ttl_seconds = 60
        remote_ttl_seconds = 60
        "#,
    );

    let result = ConfigLoader::load_file_with_overrides(
        dir.path().join("tiercache.toml"),
        Some(HashMap::new()),
    );
    assert!(matches!(
        result,
        Err(ConfigurationError::DuplicateNamespace { namespace }) if namespace == "loan"
    ));
}

#[test]
fn test_unknown_backend_is_rejected() {
    let result = ConfigLoader::from_toml_str(
        r#"
        [remote]
        backend = "memcached"
        "#,
    );
    assert!(matches!(
        result,
        Err(ConfigurationError::UnknownBackend { .. })
    ));
}

#[test]
fn test_malformed_toml_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "tiercache.toml", "[remote\nbackend = ");

    let result = ConfigLoader::load_file_with_overrides(
        dir.path().join("tiercache.toml"),
        Some(HashMap::new()),
    );
    assert!(matches!(result, Err(ConfigurationError::ParseError { .. })));
}

#[tokio::test]
async fn test_loaded_config_builds_an_engine() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "tiercache.toml", BASE);
    let config = ConfigLoader::load_file_with_overrides(
        dir.path().join("tiercache.toml"),
        Some(HashMap::new()),
    )
    .unwrap();

    let engine = CacheEngine::from_config(config).await.unwrap();

    assert_eq!(engine.health().local_capacity, 70);
    assert_eq!(engine.policy("payment").unwrap().max_local_entries.get(), 20);
    assert!(engine.policy("profile").is_err());
}

#[test]
fn test_repository_config_files_are_valid() {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config");
    for environment in ["development", "test", "production"] {
        let config = ConfigLoader::load_from_directory_with_env(&dir, environment)
            .unwrap_or_else(|e| panic!("{environment}: {e}"));
        assert_eq!(config.namespaces.len(), 8, "{environment}");
    }
}
