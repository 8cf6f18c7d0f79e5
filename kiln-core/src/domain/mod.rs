//! Core domain types
//!
//! This module contains the core domain structures used across Kiln crates.
//! These types represent the fundamental business entities and are shared between
//! the surrounding platform (which persists and runs pipelines) and the builder
//! (which compiles them).

pub mod build;
pub mod pipeline;
