//! Configuration Loader
//!
//! Environment-aware loading built on the `config` crate. Sources are merged in
//! order, later ones winning:
//!
//! 1. `tiercache.toml` (base)
//! 2. `tiercache.<environment>.toml` (optional override)
//! 3. `TIERCACHE__SECTION__FIELD` environment variables
//!
//! Sections a source omits keep their defaults. The merged result is always
//! validated before it is handed out.

use super::error::{ConfigResult, ConfigurationError};
use super::CacheEngineConfig;
use crate::constants::env as env_vars;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const BASE_FILE_STEM: &str = "tiercache";
const DEFAULT_CONFIG_DIRECTORY: &str = "config";

type Builder = ConfigBuilder<config::builder::DefaultState>;

/// Loads and validates `CacheEngineConfig`
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from `./config` for the detected environment
    pub fn load() -> ConfigResult<CacheEngineConfig> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(Path::new(DEFAULT_CONFIG_DIRECTORY), &environment)
    }

    /// Load from a directory with an explicit environment name
    ///
    /// Both files are optional; with neither present the defaults apply,
    /// still subject to environment variable overrides.
    pub fn load_from_directory_with_env(
        config_dir: &Path,
        environment: &str,
    ) -> ConfigResult<CacheEngineConfig> {
        let base = config_dir.join(format!("{BASE_FILE_STEM}.toml"));
        let overlay = config_dir.join(format!("{BASE_FILE_STEM}.{environment}.toml"));

        debug!(
            environment = environment,
            config_directory = %config_dir.display(),
            "Loading cache configuration"
        );

        let builder = Config::builder()
            .add_source(File::from(base).format(FileFormat::Toml).required(false))
            .add_source(File::from(overlay).format(FileFormat::Toml).required(false))
            .add_source(Self::environment_source(None));

        Self::finish(builder, &format!("{}", config_dir.display())).map_err(|e| match e {
            ConfigurationError::ParseError { error, .. } => {
                ConfigurationError::environment_config_error(environment, error)
            }
            other => other,
        })
    }

    /// Load a single required TOML file plus environment overrides
    pub fn load_file(path: impl AsRef<Path>) -> ConfigResult<CacheEngineConfig> {
        Self::load_file_with_overrides(path, None)
    }

    /// Load a single required TOML file, taking overrides from `overrides`
    /// instead of the process environment when given
    ///
    /// Keys use the same `TIERCACHE__SECTION__FIELD` layout as real
    /// environment variables.
    pub fn load_file_with_overrides(
        path: impl AsRef<Path>,
        overrides: Option<HashMap<String, String>>,
    ) -> ConfigResult<CacheEngineConfig> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigurationError::config_file_not_found(vec![path
                .display()
                .to_string()]));
        }

        let builder = Config::builder()
            .add_source(File::from(PathBuf::from(path)).format(FileFormat::Toml))
            .add_source(Self::environment_source(overrides));

        Self::finish(builder, &path.display().to_string())
    }

    /// Parse configuration from TOML text without consulting the environment
    pub fn from_toml_str(toml: &str) -> ConfigResult<CacheEngineConfig> {
        let builder = Config::builder().add_source(File::from_str(toml, FileFormat::Toml));
        Self::finish(builder, "<inline>")
    }

    /// Detect the current environment from `TIERCACHE_ENV`, then `APP_ENV`
    pub fn detect_environment() -> String {
        std::env::var(env_vars::ENVIRONMENT)
            .or_else(|_| std::env::var(env_vars::FALLBACK_ENVIRONMENT))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn environment_source(overrides: Option<HashMap<String, String>>) -> Environment {
        Environment::with_prefix(env_vars::CONFIG_PREFIX)
            .separator(env_vars::CONFIG_SEPARATOR)
            .try_parsing(true)
            .source(overrides)
    }

    fn finish(builder: Builder, source_name: &str) -> ConfigResult<CacheEngineConfig> {
        let merged = builder
            .build()
            .map_err(|e| ConfigurationError::parse_error(source_name, e))?;
        let config: CacheEngineConfig = merged
            .try_deserialize()
            .map_err(|e| ConfigurationError::parse_error(source_name, e))?;

        config.validate()?;
        debug!(
            source = source_name,
            namespaces = config.namespaces.len(),
            backend = %config.remote.backend,
            "Cache configuration loaded"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config = ConfigLoader::from_toml_str("").expect("empty config should load");
        assert_eq!(
            config.namespaces.len(),
            CacheEngineConfig::default().namespaces.len()
        );
        assert_eq!(config.remote.backend, "memory");
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = ConfigLoader::from_toml_str(
            r#"
            [circuit_breaker]
            cooldown_seconds = 60
            "#,
        )
        .expect("config should load");
        assert_eq!(config.circuit_breaker.cooldown_seconds, 60);
        assert_eq!(config.circuit_breaker.failure_threshold, 1);
        assert_eq!(config.maintenance.sweep_budget, 1000);
    }

    #[test]
    fn test_invalid_namespace_row_fails_validation() {
        let result = ConfigLoader::from_toml_str(
            r#"
            [[namespaces]]
            name = "loan"
            max_local_entries = 10
            local_ttl_seconds = 600
            remote_ttl_seconds = 60
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_is_reported() {
        let result = ConfigLoader::load_file("/definitely/not/here/tiercache.toml");
        assert!(matches!(
            result,
            Err(ConfigurationError::ConfigFileNotFound { .. })
        ));
    }
}
