//! Build service
//!
//! Drives one build request through the lifecycle:
//! - Claiming the pipeline name so only one build per name runs
//! - Dispatching to the builder registered for the pipeline type
//! - Running prepare, execute and copy in order, stopping at the first failure
//! - Removing the working directory on every exit path
//! - Publishing the built pipeline in the active pipeline registry

use async_trait::async_trait;
use kiln_core::domain::build::{BuildStage, BuildState};
use kiln_core::domain::pipeline::Pipeline;
use kiln_core::dto::pipeline::CreatePipeline;
use kiln_core::naming::is_valid_pipeline_name;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{BuildError, Result};
use crate::factory::BuilderFactory;
use crate::lifecycle::{BuildPipeline, workspace_dir};
use crate::registry::{ActivePipelines, BuildLocks};
use crate::workspace::WorkspaceGuard;

/// Summary of a successful build
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub build_id: Uuid,
    pub pipeline: Pipeline,
    pub artifact: PathBuf,
    pub duration: Duration,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    pub state: BuildState,
}

/// Service trait for building pipelines
#[async_trait]
pub trait BuildService: Send + Sync {
    /// Builds the requested pipeline into a plugin artifact
    ///
    /// `request.state` holds the terminal state when this returns, whether
    /// the build succeeded or not.
    async fn build(&self, request: &mut CreatePipeline) -> Result<BuildReport>;
}

/// Standard implementation of BuildService
pub struct StandardBuildService {
    factory: BuilderFactory,
    active: Arc<ActivePipelines>,
    locks: BuildLocks,
}

impl StandardBuildService {
    /// Creates a new build service publishing into `active`
    pub fn new(factory: BuilderFactory, active: Arc<ActivePipelines>) -> Self {
        Self {
            factory,
            active,
            locks: BuildLocks::new(),
        }
    }

    /// Shares build locks with other services
    pub fn with_locks(mut self, locks: BuildLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn active_pipelines(&self) -> &Arc<ActivePipelines> {
        &self.active
    }

    pub fn locks(&self) -> &BuildLocks {
        &self.locks
    }

    fn enter(request: &mut CreatePipeline, next: BuildState) {
        if !request.state.can_transition_to(&next) {
            warn!(
                "Unexpected build state transition for '{}': {} -> {}",
                request.name(),
                request.state,
                next
            );
        }
        request.state = next;
    }

    /// Runs prepare, execute and copy, returning the published artifact
    async fn run_stages(
        builder: &dyn BuildPipeline,
        request: &mut CreatePipeline,
    ) -> Result<PathBuf> {
        Self::enter(request, BuildState::Preparing);
        if let Err(e) = builder.prepare_environment(request).await {
            return Err(Self::fail(request, BuildStage::Prepare, e));
        }

        Self::enter(request, BuildState::Building);
        if let Err(e) = builder.execute_build(request).await {
            return Err(Self::fail(request, BuildStage::Execute, e));
        }

        Self::enter(request, BuildState::Copying);
        if let Err(e) = builder.copy_binary(request).await {
            return Err(Self::fail(request, BuildStage::Copy, e));
        }

        match request.pipeline.exec_path.clone() {
            Some(artifact) => Ok(artifact),
            None => {
                let err = BuildError::Artifact {
                    message: format!(
                        "builder did not report an artifact for '{}'",
                        request.name()
                    ),
                    source: None,
                };
                Err(Self::fail(request, BuildStage::Copy, err))
            }
        }
    }

    fn fail(request: &mut CreatePipeline, stage: BuildStage, err: BuildError) -> BuildError {
        error!(
            "Build {} of pipeline '{}' failed during {}: {}",
            request.id,
            request.name(),
            stage,
            err
        );
        request.state = err.state_for(stage);
        err
    }
}

#[async_trait]
impl BuildService for StandardBuildService {
    async fn build(&self, request: &mut CreatePipeline) -> Result<BuildReport> {
        let name = request.name().to_string();
        let pipeline_type = request.pipeline.pipeline_type;

        if !is_valid_pipeline_name(&name) {
            return Err(Self::fail(
                request,
                BuildStage::Prepare,
                BuildError::InvalidName(name),
            ));
        }

        let Some(_lease) = self.locks.try_acquire(&name) else {
            return Err(Self::fail(
                request,
                BuildStage::Prepare,
                BuildError::AlreadyBuilding(name),
            ));
        };

        let Some(builder) = self.factory.create(pipeline_type) else {
            return Err(Self::fail(
                request,
                BuildStage::Prepare,
                BuildError::UnsupportedType(pipeline_type),
            ));
        };

        info!(
            "Starting build {} of pipeline '{}' ({})",
            request.id, name, pipeline_type
        );
        let started = Instant::now();

        let workspace =
            WorkspaceGuard::new(workspace_dir(&self.factory.config().tmp_root, request));
        let outcome = Self::run_stages(builder.as_ref(), request).await;
        if let Err(e) = workspace.release().await {
            warn!(
                "Failed to cleanup workspace for build {}: {}",
                request.id, e
            );
        }
        let artifact = outcome?;

        Self::enter(request, BuildState::Done);
        self.active.append(request.pipeline.clone());

        let duration = started.elapsed();
        info!(
            "Build {} of pipeline '{}' completed in {:?}",
            request.id, name, duration
        );

        Ok(BuildReport {
            build_id: request.id,
            pipeline: request.pipeline.clone(),
            artifact,
            duration,
            finished_at: chrono::Utc::now(),
            state: request.state,
        })
    }
}
