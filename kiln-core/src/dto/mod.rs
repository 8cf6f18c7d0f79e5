//! Data Transfer Objects
//!
//! Requests handed to the builder by the surrounding platform.

pub mod pipeline;
