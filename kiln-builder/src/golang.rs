//! Go pipeline builder

use async_trait::async_trait;
use kiln_core::domain::pipeline::PipelineType;
use kiln_core::dto::pipeline::CreatePipeline;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{BuildConfig, ToolchainConfig};
use crate::error::{BuildError, Result};
use crate::lifecycle::{
    BuildPipeline, artifact_path, binary_path, ensure_valid_name, workspace_dir,
};
use crate::process;
use crate::workspace::stage_source;

/// Builds golang pipelines with the configured Go toolchain
#[derive(Debug, Clone)]
pub struct BuildPipelineGolang {
    tmp_root: PathBuf,
    plugin_dir: PathBuf,
    timeout: Duration,
    toolchain: ToolchainConfig,
}

impl BuildPipelineGolang {
    pub fn new(config: &BuildConfig) -> Self {
        Self {
            tmp_root: config.tmp_root.clone(),
            plugin_dir: config.plugin_dir.clone(),
            timeout: config.build_timeout,
            toolchain: config.golang.clone(),
        }
    }
}

#[async_trait]
impl BuildPipeline for BuildPipelineGolang {
    fn pipeline_type(&self) -> PipelineType {
        PipelineType::Golang
    }

    async fn prepare_environment(&self, request: &mut CreatePipeline) -> Result<()> {
        ensure_valid_name(request)?;
        let workspace = workspace_dir(&self.tmp_root, request);
        debug!(
            "Preparing workspace {} for pipeline '{}'",
            workspace.display(),
            request.name()
        );

        stage_source(&request.source, &workspace).await?;
        request.workspace = Some(workspace);
        Ok(())
    }

    async fn execute_build(&self, request: &mut CreatePipeline) -> Result<()> {
        let workspace = request.workspace.clone().ok_or_else(|| BuildError::Environment {
            message: format!("pipeline '{}' has no prepared workspace", request.name()),
            source: None,
        })?;

        let output = binary_path(&workspace, request);
        let steps: Vec<_> = self
            .toolchain
            .steps
            .iter()
            .map(|step| step.expand(&output, request.name()))
            .collect();

        match process::run_steps(&steps, &workspace, &self.toolchain.env, self.timeout).await {
            Ok(out) => {
                request.append_output(&out);
                info!("Compiled pipeline '{}'", request.name());
                Ok(())
            }
            Err(e) => {
                if let BuildError::Compile { output, .. } = &e {
                    request.append_output(output);
                }
                Err(e)
            }
        }
    }

    async fn copy_binary(&self, request: &mut CreatePipeline) -> Result<()> {
        ensure_valid_name(request)?;
        let workspace = request.workspace.clone().ok_or_else(|| BuildError::Artifact {
            message: format!("pipeline '{}' has no prepared workspace", request.name()),
            source: None,
        })?;

        let binary = binary_path(&workspace, request);
        if !tokio::fs::metadata(&binary)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            return Err(BuildError::Artifact {
                message: format!("compiled binary {} is missing", binary.display()),
                source: None,
            });
        }

        let target = artifact_path(&self.plugin_dir, request);
        publish(&binary, &target, request).await?;

        info!(
            "Published pipeline '{}' to {}",
            request.name(),
            target.display()
        );
        request.pipeline.exec_path = Some(target);
        Ok(())
    }
}

/// Copies `binary` next to `target` and renames it into place
///
/// Readers of the plugin directory never see a half-written artifact, and a
/// previous artifact is replaced in one step.
async fn publish(binary: &Path, target: &Path, request: &CreatePipeline) -> Result<()> {
    let plugin_dir = target.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(plugin_dir).await.map_err(|e| {
        BuildError::artifact(
            format!("failed to create plugin directory {}", plugin_dir.display()),
            e,
        )
    })?;

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = plugin_dir.join(format!(".{}.{}.tmp", file_name, request.id));

    let result = async {
        tokio::fs::copy(binary, &staging).await.map_err(|e| {
            BuildError::artifact(format!("failed to copy {}", binary.display()), e)
        })?;
        make_executable(&staging).await?;
        tokio::fs::rename(&staging, target).await.map_err(|e| {
            BuildError::artifact(format!("failed to move artifact to {}", target.display()), e)
        })
    }
    .await;

    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&staging).await {
            warn!("Failed to remove staging file {}: {}", staging.display(), e);
        }
    }
    result
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|e| BuildError::artifact("failed to mark artifact executable", e))
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
