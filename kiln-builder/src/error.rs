//! Error types for the builder

use kiln_core::domain::build::{BuildStage, BuildState, FailureKind};
use kiln_core::domain::pipeline::PipelineType;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for build operations
pub type Result<T> = std::result::Result<T, BuildError>;

/// Errors that can occur while building a pipeline
#[derive(Debug, Error)]
pub enum BuildError {
    /// Working directory could not be created or the source could not be staged
    #[error("Environment error: {message}")]
    Environment {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The toolchain process could not be started
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The toolchain ran and reported a failure
    #[error("Compile error (exit code {}): {output}", .exit_code.map_or("none".to_string(), |c| c.to_string()))]
    Compile {
        /// Exit code, `None` when the process was killed by a signal
        exit_code: Option<i32>,
        /// Combined stdout/stderr of the failing step
        output: String,
    },

    /// The execute stage exceeded its ceiling
    #[error("Build timed out after {limit:?}")]
    Timeout { limit: Duration },

    /// The compiled binary could not be published
    #[error("Artifact error: {message}")]
    Artifact {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// No builder is registered for the pipeline type
    #[error("Unsupported pipeline type: {0}")]
    UnsupportedType(PipelineType),

    /// The pipeline name cannot be used as an artifact name
    #[error("Invalid pipeline name: '{0}'")]
    InvalidName(String),

    /// Another build holds the pipeline name
    #[error("Pipeline '{0}' is already being built")]
    AlreadyBuilding(String),
}

impl BuildError {
    /// Create an environment error wrapping an I/O failure
    pub fn environment(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Environment {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create an artifact error wrapping an I/O failure
    pub fn artifact(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Artifact {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Failure category, as recorded in the build state
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Environment { .. } => FailureKind::Environment,
            Self::Spawn { .. } => FailureKind::Spawn,
            Self::Compile { .. } => FailureKind::Compile,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Artifact { .. } => FailureKind::Artifact,
            Self::UnsupportedType(_) | Self::InvalidName(_) | Self::AlreadyBuilding(_) => {
                FailureKind::Configuration
            }
        }
    }

    /// Terminal build state for a failure that happened during `stage`
    pub fn state_for(&self, stage: BuildStage) -> BuildState {
        match self {
            Self::Timeout { .. } => BuildState::TimedOut,
            _ => BuildState::Failed {
                stage,
                kind: self.kind(),
            },
        }
    }

    /// Check if this error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if retrying could succeed without changing the pipeline source
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Environment { .. }
                | Self::Spawn { .. }
                | Self::Artifact { .. }
                | Self::AlreadyBuilding(_)
        )
    }
}
