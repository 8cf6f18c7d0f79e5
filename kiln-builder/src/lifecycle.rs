//! Build pipeline lifecycle
//!
//! Every pipeline type has a builder implementing [`BuildPipeline`]. A build
//! attempt calls the three stages in order on the same request:
//!
//! 1. `prepare_environment` creates the working directory and stages the source
//! 2. `execute_build` runs the toolchain, bounded by the configured ceiling
//! 3. `copy_binary` publishes the compiled binary to the plugin directory
//!
//! Stages do not enforce ordering themselves. A failing stage must stop the
//! attempt, and the working directory must be removed on every exit path;
//! [`crate::service::StandardBuildService`] does both.

use async_trait::async_trait;
use kiln_core::domain::pipeline::PipelineType;
use kiln_core::dto::pipeline::CreatePipeline;
use kiln_core::naming::{append_type_to_name, is_valid_pipeline_name};
use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};

/// Lifecycle contract for pipelines which are not yet compiled
#[async_trait]
pub trait BuildPipeline: Send + Sync {
    /// The pipeline type this builder compiles
    fn pipeline_type(&self) -> PipelineType;

    /// Prepares the environment before the build starts
    ///
    /// Creates an isolated working directory for this attempt, stages the
    /// source into it and records it in `request.workspace`.
    ///
    /// # Errors
    /// `BuildError::Environment` if the directory cannot be created or the
    /// source cannot be staged
    async fn prepare_environment(&self, request: &mut CreatePipeline) -> Result<()>;

    /// Executes the compiler and tracks the compiling process
    ///
    /// Output is appended to `request.output`. The stage is bounded by the
    /// configured ceiling; on expiry the compiler is killed.
    ///
    /// # Errors
    /// - `BuildError::Spawn` if the compiler could not be started
    /// - `BuildError::Compile` if the compiler reported a failure
    /// - `BuildError::Timeout` if the ceiling was exceeded
    async fn execute_build(&self, request: &mut CreatePipeline) -> Result<()>;

    /// Copies the compiled binary to the plugin directory
    ///
    /// Replaces any previous artifact for the same name and type, and records
    /// the published path in `request.pipeline.exec_path`.
    ///
    /// # Errors
    /// `BuildError::Artifact` if the binary is missing or cannot be copied
    async fn copy_binary(&self, request: &mut CreatePipeline) -> Result<()>;
}

/// Rejects names that would place files outside the build directories
pub fn ensure_valid_name(request: &CreatePipeline) -> Result<()> {
    if is_valid_pipeline_name(request.name()) {
        Ok(())
    } else {
        Err(BuildError::InvalidName(request.name().to_string()))
    }
}

/// Working directory for one build attempt: `<tmp_root>/<type>/<name>-<build id>`
pub fn workspace_dir(tmp_root: &Path, request: &CreatePipeline) -> PathBuf {
    tmp_root
        .join(request.pipeline.pipeline_type.as_str())
        .join(format!("{}-{}", request.name(), request.id))
}

/// Path of the compiled binary inside the working directory
pub fn binary_path(workspace: &Path, request: &CreatePipeline) -> PathBuf {
    workspace.join(request.name())
}

/// Final artifact location: `<plugin_dir>/<name>_<type>`
pub fn artifact_path(plugin_dir: &Path, request: &CreatePipeline) -> PathBuf {
    plugin_dir.join(append_type_to_name(
        request.name(),
        request.pipeline.pipeline_type,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::domain::pipeline::Pipeline;

    #[test]
    fn test_layout_paths() {
        let req = CreatePipeline::new(Pipeline::new("demo", PipelineType::Golang), "/src/demo");

        let ws = workspace_dir(Path::new("/home/kiln/tmp"), &req);
        assert_eq!(
            ws,
            PathBuf::from(format!("/home/kiln/tmp/golang/demo-{}", req.id))
        );
        assert_eq!(binary_path(&ws, &req), ws.join("demo"));
        assert_eq!(
            artifact_path(Path::new("/home/kiln/plugins"), &req),
            PathBuf::from("/home/kiln/plugins/demo_golang")
        );
    }

    #[test]
    fn test_ensure_valid_name() {
        let ok = CreatePipeline::new(Pipeline::new("demo", PipelineType::Golang), "/src");
        assert!(ensure_valid_name(&ok).is_ok());

        let escaping = CreatePipeline::new(Pipeline::new("../x", PipelineType::Golang), "/src");
        assert!(matches!(
            ensure_valid_name(&escaping),
            Err(BuildError::InvalidName(name)) if name == "../x"
        ));
    }

    #[test]
    fn test_workspaces_are_namespaced_per_attempt() {
        let p = Pipeline::new("demo", PipelineType::Golang);
        let a = CreatePipeline::new(p.clone(), "/src");
        let b = CreatePipeline::new(p, "/src");

        assert_ne!(
            workspace_dir(Path::new("tmp"), &a),
            workspace_dir(Path::new("tmp"), &b)
        );
    }
}
