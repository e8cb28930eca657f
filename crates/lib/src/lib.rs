//! lakeflake-lib: core types and logic for lakeflake
//!
//! This crate evaluates a build-and-environment descriptor:
//! - `Descriptor`: the immutable project description (`lakeflake.toml`)
//! - `inputs`: pinned external inputs, `follows`, and the lock file
//! - `Outputs`: per-platform packages and development shells
//! - `build`: realizing a package on the host

pub mod build;
pub mod consts;
pub mod descriptor;
pub mod eval;
pub mod init;
pub mod inputs;
pub mod outputs;
pub mod pkgs;
pub mod platform;
pub mod util;
