//! Service layer
//!
//! Services contain the business logic of the builder. They orchestrate the
//! factory, the lifecycle stages and the active pipeline registry.
//!
//! Services are trait-based to enable testing and dependency injection.

mod build;

pub use build::BuildService;

pub use build::{BuildReport, StandardBuildService};
