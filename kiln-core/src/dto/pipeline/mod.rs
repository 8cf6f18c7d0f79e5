//! Pipeline build request

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::domain::build::BuildState;
use crate::domain::pipeline::Pipeline;

/// Request to build a pipeline into a plugin artifact
///
/// Passed by reference through every lifecycle stage. Stages record what
/// they produce (workspace, compiler output, artifact path) back into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePipeline {
    /// Build attempt identifier, used to namespace the working directory
    pub id: Uuid,
    pub pipeline: Pipeline,
    /// Directory holding the pipeline source
    pub source: PathBuf,
    /// Working directory, set once the environment is prepared
    #[serde(default)]
    pub workspace: Option<PathBuf>,
    /// Captured toolchain output
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub state: BuildState,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl CreatePipeline {
    /// Creates a pending build request for the given pipeline
    pub fn new(pipeline: Pipeline, source: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline,
            source: source.into(),
            workspace: None,
            output: String::new(),
            state: BuildState::Pending,
            created_at: chrono::Utc::now(),
        }
    }

    /// Name of the pipeline being built
    pub fn name(&self) -> &str {
        &self.pipeline.name
    }

    /// Appends toolchain output, keeping one trailing newline between chunks
    pub fn append_output(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        if !self.output.is_empty() && !self.output.ends_with('\n') {
            self.output.push('\n');
        }
        self.output.push_str(chunk);
    }
}
