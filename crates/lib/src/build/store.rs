//! Build output storage.
//!
//! Realized packages live at `<store>/<spec-hash>-<name>/`. A store entry is
//! only trusted once it carries a completion marker whose recorded output hash
//! still matches the entry's content.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::BuildError;
use crate::util::hash::{ContentHash, ObjectHash, hash_tree};

/// Marker file name indicating a build completed successfully.
pub const BUILD_COMPLETE_MARKER: &str = ".lakeflake-complete";

/// Entries excluded when hashing build outputs. The marker is written after
/// the hash is taken.
const BUILD_HASH_EXCLUSIONS: &[&str] = &[BUILD_COMPLETE_MARKER, "tmp"];

const MARKER_VERSION: u32 = 1;

/// Marker file content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMarker {
  pub version: u32,
  /// Always "complete" for successful builds.
  pub status: String,
  /// Full SHA-256 of the store entry.
  pub output_hash: String,
}

pub fn build_dir_name(hash: &ObjectHash, name: &str) -> String {
  format!("{}-{}", hash.0, name)
}

pub fn build_dir_path(store: &Path, hash: &ObjectHash, name: &str) -> PathBuf {
  store.join(build_dir_name(hash, name))
}

/// Hash a store entry and record the result in its completion marker.
pub fn write_build_marker(store_path: &Path) -> Result<ContentHash, BuildError> {
  let output_hash = hash_tree(store_path, BUILD_HASH_EXCLUSIONS)?;

  let marker = BuildMarker {
    version: MARKER_VERSION,
    status: "complete".to_string(),
    output_hash: output_hash.0.clone(),
  };
  let content = serde_json::to_string(&marker).map_err(|e| BuildError::WriteMarker { message: e.to_string() })?;
  fs::write(store_path.join(BUILD_COMPLETE_MARKER), format!("{}\n", content))
    .map_err(|e| BuildError::WriteMarker { message: e.to_string() })?;
  Ok(output_hash)
}

/// Read the completion marker of a store entry.
///
/// Returns `None` if the marker doesn't exist.
pub fn read_build_marker(store_path: &Path) -> Result<Option<BuildMarker>, BuildError> {
  let marker_path = store_path.join(BUILD_COMPLETE_MARKER);
  if !marker_path.exists() {
    return Ok(None);
  }

  let content = fs::read_to_string(&marker_path).map_err(|e| BuildError::ReadMarker { message: e.to_string() })?;
  let marker: BuildMarker =
    serde_json::from_str(&content).map_err(|e| BuildError::ParseMarker { message: e.to_string() })?;
  Ok(Some(marker))
}

/// Return the output hash of a store entry that can be reused.
///
/// `None` means the entry is missing, incomplete or corrupted.
pub fn verified_output(store_path: &Path) -> Option<ContentHash> {
  let marker = match read_build_marker(store_path) {
    Ok(Some(marker)) => marker,
    Ok(None) => {
      debug!(path = ?store_path, "no completion marker");
      return None;
    }
    Err(e) => {
      debug!(path = ?store_path, error = %e, "invalid marker");
      return None;
    }
  };

  match hash_tree(store_path, BUILD_HASH_EXCLUSIONS) {
    Ok(current) if current.0 == marker.output_hash => Some(current),
    Ok(current) => {
      warn!(
        path = ?store_path,
        expected = %marker.output_hash,
        actual = %current,
        "build output corrupted, will rebuild"
      );
      None
    }
    Err(e) => {
      warn!(path = ?store_path, error = %e, "failed to hash build output, will rebuild");
      None
    }
  }
}
