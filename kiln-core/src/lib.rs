//! Kiln Core
//!
//! Core types and abstractions for the Kiln pipeline build system.
//!
//! This crate contains:
//! - Domain types: Core business entities (Pipeline, PipelineType, BuildState)
//! - DTOs: The build request passed through the build lifecycle
//! - Naming: The artifact file naming convention

pub mod domain;
pub mod dto;
pub mod naming;
