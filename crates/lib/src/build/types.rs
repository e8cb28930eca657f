use std::path::PathBuf;

use thiserror::Error;

use crate::platform::Platform;
use crate::platform::paths::store_dir;
use crate::util::hash::{ContentHash, HashError, TreeHashError};

/// Errors that can occur while realizing a package.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error("cannot build {requested} outputs on a {host} host")]
  PlatformMismatch { requested: Platform, host: Platform },

  #[error("the host platform is not supported")]
  UnsupportedHost,

  #[error("build command for '{0}' is empty")]
  EmptyCommand(String),

  #[error("failed to start '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// The toolchain rejected the source tree. `stderr` is its output, verbatim.
  #[error("failed to compile '{name}' (exit code {code:?}):\n{stderr}")]
  Compile {
    name: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("toolchain succeeded but produced no artifact at {}", .0.display())]
  MissingArtifact(PathBuf),

  #[error("failed to hash build spec: {0}")]
  Hash(#[source] HashError),

  #[error(transparent)]
  TreeHash(#[from] TreeHashError),

  #[error("failed to write build marker: {message}")]
  WriteMarker { message: String },

  #[error("failed to read build marker: {message}")]
  ReadMarker { message: String },

  #[error("failed to parse build marker: {message}")]
  ParseMarker { message: String },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Where and for which platform realization happens.
#[derive(Debug, Clone)]
pub struct BuildConfig {
  /// Store root holding realized outputs.
  pub store: PathBuf,
  /// The platform builds run on.
  pub host: Platform,
}

impl BuildConfig {
  /// Configuration for the current machine and the default store.
  pub fn for_host() -> Result<Self, BuildError> {
    Ok(Self {
      store: store_dir(),
      host: Platform::current().ok_or(BuildError::UnsupportedHost)?,
    })
  }
}

/// A realized package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
  /// Store entry, `<store>/<spec-hash>-<name>`.
  pub store_path: PathBuf,
  /// The binary inside the store entry.
  pub binary: PathBuf,
  /// Hash of the store entry's content.
  pub output_hash: ContentHash,
  /// Whether an existing store entry was reused.
  pub cached: bool,
}
