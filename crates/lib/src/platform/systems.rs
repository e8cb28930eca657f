//! Supported platform enumeration.
//!
//! The platform-enumeration input decides which platforms a descriptor is
//! evaluated for. An input may ship a `systems.json` file at its root holding
//! a JSON array of platform triples; inputs without one report the default
//! set.

use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use super::Platform;
use super::arch::Arch;
use super::os::Os;
use crate::inputs::ResolvedInput;
use crate::inputs::fetch::{FetchError, read_input_file};

/// File name looked up at the root of the platform-enumeration input.
pub const SYSTEMS_FILENAME: &str = "systems.json";

/// Platforms reported when the input does not list its own.
pub const DEFAULT_SYSTEMS: [Platform; 4] = [
  Platform {
    arch: Arch::X86_64,
    os: Os::Linux,
  },
  Platform {
    arch: Arch::Aarch64,
    os: Os::Linux,
  },
  Platform {
    arch: Arch::X86_64,
    os: Os::Darwin,
  },
  Platform {
    arch: Arch::Aarch64,
    os: Os::Darwin,
  },
];

#[derive(Debug, Error)]
pub enum SystemsError {
  #[error("failed to read {SYSTEMS_FILENAME}: {0}")]
  Read(#[source] FetchError),

  #[error("failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("{path} lists no platforms")]
  Empty { path: PathBuf },
}

/// Enumerate the platforms supported by a resolved input.
///
/// The file is read at the input's pinned revision. The result is sorted and
/// free of duplicates.
pub fn enumerate_systems(input: &ResolvedInput) -> Result<Vec<Platform>, SystemsError> {
  let path = input.path.join(SYSTEMS_FILENAME);
  let Some(content) = read_input_file(input, SYSTEMS_FILENAME).map_err(SystemsError::Read)? else {
    debug!(input = %input.url, "no systems file, using default platforms");
    return Ok(default_systems());
  };

  let mut systems: Vec<Platform> =
    serde_json::from_str(&content).map_err(|source| SystemsError::Parse { path: path.clone(), source })?;
  if systems.is_empty() {
    return Err(SystemsError::Empty { path });
  }

  systems.sort();
  systems.dedup();
  debug!(count = systems.len(), "enumerated platforms");
  Ok(systems)
}

pub fn default_systems() -> Vec<Platform> {
  let mut systems = DEFAULT_SYSTEMS.to_vec();
  systems.sort();
  systems
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::TempDir;

  fn input(temp: &TempDir) -> ResolvedInput {
    ResolvedInput::new("path:./utils", temp.path().to_path_buf(), "local")
  }

  #[test]
  fn missing_file_yields_defaults() {
    let temp = TempDir::new().unwrap();
    let systems = enumerate_systems(&input(&temp)).unwrap();

    assert_eq!(systems.len(), 4);
    assert!(systems.contains(&"aarch64-darwin".parse().unwrap()));
    assert!(systems.contains(&"x86_64-linux".parse().unwrap()));
  }

  #[test]
  fn file_restricts_platforms() {
    let temp = TempDir::new().unwrap();
    fs::write(
      temp.path().join(SYSTEMS_FILENAME),
      r#"["x86_64-linux", "aarch64-darwin", "x86_64-linux"]"#,
    )
    .unwrap();

    let systems = enumerate_systems(&input(&temp)).unwrap();
    let triples: Vec<String> = systems.iter().map(Platform::triple).collect();
    assert_eq!(triples, vec!["x86_64-linux", "aarch64-darwin"]);
  }

  #[test]
  fn unknown_platform_in_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(SYSTEMS_FILENAME), r#"["riscv64-linux"]"#).unwrap();

    assert!(matches!(enumerate_systems(&input(&temp)), Err(SystemsError::Parse { .. })));
  }

  #[test]
  fn empty_list_is_an_error() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(SYSTEMS_FILENAME), "[]").unwrap();

    assert!(matches!(enumerate_systems(&input(&temp)), Err(SystemsError::Empty { .. })));
  }
}
