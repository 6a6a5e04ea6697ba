//! Configuration Error Types
//!
//! Errors raised while loading or validating the cache engine configuration.
//! Validation is strict: a bad namespace row or an impossible breaker setting
//! fails start-up instead of being silently corrected.

use thiserror::Error;

/// Configuration-specific errors
#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    /// Configuration file not found at any of the searched paths
    #[error("Configuration file not found. Searched paths: {searched_paths:?}")]
    ConfigFileNotFound { searched_paths: Vec<String> },

    /// Failed to read configuration file
    #[error("Failed to read configuration file '{file_path}': {error}")]
    FileReadError { file_path: String, error: String },

    /// Configuration sources could not be parsed or merged
    #[error("Failed to parse configuration from '{source_name}': {error}")]
    ParseError { source_name: String, error: String },

    /// Required configuration field is missing
    #[error("Missing required configuration field '{field}' in {context}")]
    MissingRequiredField { field: String, context: String },

    /// Configuration field has an invalid value
    #[error("Invalid value for field '{field}': {value} (in {context})")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    /// The same namespace appears more than once in the policy table
    #[error("Namespace '{namespace}' is configured more than once")]
    DuplicateNamespace { namespace: String },

    /// Unknown remote backend name
    #[error("Unknown remote cache backend '{backend}'. Supported: {supported:?}")]
    UnknownBackend {
        backend: String,
        supported: Vec<String>,
    },

    /// Environment-specific configuration error
    #[error("Environment configuration error for '{environment}': {error}")]
    EnvironmentConfigError { environment: String, error: String },

    /// Generic validation error
    #[error("Configuration validation error: {error}")]
    ValidationError { error: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigurationError>;

impl ConfigurationError {
    /// Create a config file not found error
    pub fn config_file_not_found(searched_paths: Vec<impl AsRef<str>>) -> Self {
        Self::ConfigFileNotFound {
            searched_paths: searched_paths
                .into_iter()
                .map(|p| p.as_ref().to_string())
                .collect(),
        }
    }

    /// Create a file read error
    pub fn file_read_error<P: Into<String>, E: std::fmt::Display>(file_path: P, error: E) -> Self {
        Self::FileReadError {
            file_path: file_path.into(),
            error: error.to_string(),
        }
    }

    /// Create a parse error
    pub fn parse_error<S: Into<String>, E: std::fmt::Display>(source_name: S, error: E) -> Self {
        Self::ParseError {
            source_name: source_name.into(),
            error: error.to_string(),
        }
    }

    /// Create a missing required field error
    pub fn missing_required_field<F: Into<String>, C: Into<String>>(field: F, context: C) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value<F: Into<String>, V: ToString, C: Into<String>>(
        field: F,
        value: V,
        context: C,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            context: context.into(),
        }
    }

    /// Create a duplicate namespace error
    pub fn duplicate_namespace<N: Into<String>>(namespace: N) -> Self {
        Self::DuplicateNamespace {
            namespace: namespace.into(),
        }
    }

    /// Create an unknown backend error
    pub fn unknown_backend<B: Into<String>>(backend: B, supported: &[&str]) -> Self {
        Self::UnknownBackend {
            backend: backend.into(),
            supported: supported.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Create an environment configuration error
    pub fn environment_config_error<E: Into<String>, R: std::fmt::Display>(
        environment: E,
        error: R,
    ) -> Self {
        Self::EnvironmentConfigError {
            environment: environment.into(),
            error: error.to_string(),
        }
    }

    /// Create a validation error
    pub fn validation_error<E: std::fmt::Display>(error: E) -> Self {
        Self::ValidationError {
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_field() {
        let err = ConfigurationError::invalid_value("local_ttl_seconds", 0, "namespace 'loan'");
        let msg = err.to_string();
        assert!(msg.contains("local_ttl_seconds"));
        assert!(msg.contains("namespace 'loan'"));

        let err = ConfigurationError::unknown_backend("memcached", &["memory", "noop"]);
        assert!(err.to_string().contains("memcached"));
    }

    #[test]
    fn test_file_not_found_lists_paths() {
        let err = ConfigurationError::config_file_not_found(vec!["a.toml", "b.toml"]);
        match err {
            ConfigurationError::ConfigFileNotFound { searched_paths } => {
                assert_eq!(searched_paths, vec!["a.toml", "b.toml"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
