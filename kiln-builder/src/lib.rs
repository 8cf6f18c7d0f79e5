//! Kiln Builder
//!
//! Compiles pipeline sources into plugin artifacts.
//!
//! Architecture:
//! - Configuration: temp root, plugin directory, build timeout, toolchains
//! - Registry: the shared list of active pipelines and per-name build locks
//! - Factory: maps a pipeline type to its builder
//! - Lifecycle: the prepare / execute / copy contract every builder implements
//! - Services: drive a build request through the lifecycle
//!
//! The registry is created once at startup and shared as an `Arc`:
//!
//! ```no_run
//! use std::sync::Arc;
//! use kiln_builder::{ActivePipelines, BuildConfig, BuilderFactory, StandardBuildService};
//!
//! let config = BuildConfig::from_env().expect("valid configuration");
//! let active = Arc::new(ActivePipelines::new());
//! let service = StandardBuildService::new(BuilderFactory::with_defaults(config), active);
//! ```

pub mod config;
pub mod error;
pub mod factory;
pub mod golang;
pub mod lifecycle;
pub mod process;
pub mod registry;
pub mod service;
pub mod workspace;

pub use config::{BuildConfig, CommandStep, ToolchainConfig};
pub use error::{BuildError, Result};
pub use factory::BuilderFactory;
pub use golang::BuildPipelineGolang;
pub use lifecycle::BuildPipeline;
pub use registry::{ActivePipelines, BuildLease, BuildLocks};
pub use service::{BuildReport, BuildService, StandardBuildService};
