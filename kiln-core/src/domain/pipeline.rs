//! Pipeline domain types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Source language / toolchain of a pipeline
///
/// Drives both builder dispatch and the artifact name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineType {
    Golang,
    Java,
    Python,
    Cpp,
    Ruby,
    #[serde(rename = "nodejs")]
    NodeJs,
}

impl PipelineType {
    /// All known pipeline types, in declaration order
    pub const ALL: [PipelineType; 6] = [
        PipelineType::Golang,
        PipelineType::Java,
        PipelineType::Python,
        PipelineType::Cpp,
        PipelineType::Ruby,
        PipelineType::NodeJs,
    ];

    /// Canonical string form, used in artifact names and on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineType::Golang => "golang",
            PipelineType::Java => "java",
            PipelineType::Python => "python",
            PipelineType::Cpp => "cpp",
            PipelineType::Ruby => "ruby",
            PipelineType::NodeJs => "nodejs",
        }
    }
}

impl std::fmt::Display for PipelineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not the canonical form of any pipeline type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown pipeline type: '{0}'")]
pub struct UnknownPipelineType(pub String);

impl FromStr for PipelineType {
    type Err = UnknownPipelineType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PipelineType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownPipelineType(s.to_string()))
    }
}

/// Pipeline definition
///
/// Structure shared between the platform (persists, runs) and the builder (compiles).
/// The name is the deduplication key for builds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub pipeline_type: PipelineType,
    /// Location of the published artifact, set once a build succeeded
    #[serde(default)]
    pub exec_path: Option<PathBuf>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Pipeline {
    /// Creates a new, not yet built pipeline
    pub fn new(name: impl Into<String>, pipeline_type: PipelineType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            pipeline_type,
            exec_path: None,
            created_at: chrono::Utc::now(),
        }
    }
}
