//! Input resolution and management.
//!
//! This module resolves the external inputs (git repositories and local paths)
//! declared in the descriptor's `[inputs]` table, together with the inputs those
//! inputs declare themselves.
//!
//! # Modules
//!
//! - [`source`] - URL parsing for input sources
//! - [`lock`] - Lock file management for reproducible evaluation
//! - [`fetch`] - Git fetch and path resolution operations
//! - [`resolve`] - High-level resolution orchestration
//! - [`types`] - Core input types (declarations, overrides, resolved inputs)
//! - [`graph`] - Dependency graph building and follows resolution

pub mod fetch;
pub mod graph;
pub mod lock;
pub mod resolve;
pub mod source;
mod types;

pub use types::*;
