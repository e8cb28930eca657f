//! Package realization.
//!
//! Realizing a [`BuildSpec`](crate::outputs::BuildSpec) is the only operation
//! with side effects outside the input cache: it runs the toolchain on the
//! source root and stores the resulting binary under a path derived from the
//! spec's hash.
//!
//! # Characteristics
//!
//! - **Host only**: a spec is realized only on the platform it was composed for
//! - **Cached**: a store entry with a valid completion marker is reused
//! - **All or nothing**: a failed build leaves no store entry
//!
//! # Submodules
//!
//! - [`execute`] - Toolchain invocation
//! - [`store`] - Store layout and completion markers

pub mod execute;
pub mod store;
mod types;

pub use execute::realize;
pub use types::*;
