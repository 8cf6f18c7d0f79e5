//! Builder factory
//!
//! Maps a pipeline type to the constructor of its builder. Adding a toolchain
//! means registering one more constructor; existing entries are untouched.

use kiln_core::domain::pipeline::PipelineType;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::BuildConfig;
use crate::golang::BuildPipelineGolang;
use crate::lifecycle::BuildPipeline;

/// Creates a builder from the build configuration
pub type Constructor = Arc<dyn Fn(&BuildConfig) -> Box<dyn BuildPipeline> + Send + Sync>;

/// Registration table from pipeline type to builder constructor
#[derive(Clone)]
pub struct BuilderFactory {
    config: BuildConfig,
    constructors: HashMap<PipelineType, Constructor>,
}

impl BuilderFactory {
    /// Creates a factory with no registered types
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            constructors: HashMap::new(),
        }
    }

    /// Creates a factory with every builtin builder registered
    pub fn with_defaults(config: BuildConfig) -> Self {
        let mut factory = Self::new(config);
        factory.register(
            PipelineType::Golang,
            Arc::new(|config: &BuildConfig| {
                Box::new(BuildPipelineGolang::new(config)) as Box<dyn BuildPipeline>
            }),
        );
        factory
    }

    /// Registers or replaces the constructor for a type
    pub fn register(&mut self, pipeline_type: PipelineType, constructor: Constructor) {
        debug!("Registering builder for pipeline type {}", pipeline_type);
        self.constructors.insert(pipeline_type, constructor);
    }

    /// Creates a new builder for the given pipeline type
    ///
    /// # Returns
    /// `None` if no builder is registered for the type
    pub fn create(&self, pipeline_type: PipelineType) -> Option<Box<dyn BuildPipeline>> {
        self.constructors
            .get(&pipeline_type)
            .map(|constructor| constructor(&self.config))
    }

    pub fn is_registered(&self, pipeline_type: PipelineType) -> bool {
        self.constructors.contains_key(&pipeline_type)
    }

    /// Registered types, sorted by canonical name
    pub fn registered_types(&self) -> Vec<PipelineType> {
        let mut types: Vec<_> = self.constructors.keys().copied().collect();
        types.sort_by_key(|t| t.as_str());
        types
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }
}

impl std::fmt::Debug for BuilderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuilderFactory")
            .field("config", &self.config)
            .field("registered", &self.registered_types())
            .finish()
    }
}
