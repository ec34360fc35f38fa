//! Error handling module for tapflow
//!
//! Typed errors for everything that can fail before or around a pipeline run
//! (loading documents, settings, engine state). Failures inside a running
//! action never surface as these: the executor logs them and turns them into
//! a failed step.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for pipeline loading and engine control
#[derive(Error, Debug)]
pub enum PipelineError {
    /// IO errors (unreadable config or settings file)
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML documents that do not parse or do not match the schema
    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// JSON documents that do not parse or do not match the schema
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Structurally valid documents with invalid content
    #[error("Configuration error: {0}")]
    Config(String),

    /// Engine used out of order (e.g. run before load)
    #[error("State error: {0}")]
    State(String),
}

/// Result type alias for tapflow operations
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a state error
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::config("pipeline name must not be empty");
        assert_eq!(
            err.to_string(),
            "Configuration error: pipeline name must not be empty"
        );

        let err = PipelineError::state("no configuration loaded");
        assert_eq!(err.to_string(), "State error: no configuration loaded");
    }

    #[test]
    fn test_io_error_mentions_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = PipelineError::io("missing.yaml", io_err);
        assert!(matches!(err, PipelineError::Io { .. }));
        assert!(err.to_string().contains("missing.yaml"));
    }
}
