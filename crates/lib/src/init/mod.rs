//! Scaffold a new lakeflake project.
//!
//! This module provides the core logic for the `lakeflake init` command, which
//! writes the built-in `lakecli` descriptor to a project directory and
//! prepares the store.

use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::consts::DESCRIPTOR_FILENAME;
use crate::descriptor::LAKECLI_DESCRIPTOR;
use crate::platform::paths::store_dir;

/// Errors that can occur during initialization.
#[derive(Debug, Error)]
pub enum InitError {
  #[error("file already exists: {}", path.display())]
  PathExists { path: PathBuf },

  #[error("failed to create directory {}: {source}", path.display())]
  CreateDir { path: PathBuf, source: std::io::Error },

  #[error("failed to write file {}: {source}", path.display())]
  WriteFile { path: PathBuf, source: std::io::Error },

  #[error("failed to canonicalize path {}: {source}", path.display())]
  Canonicalize { path: PathBuf, source: std::io::Error },
}

/// Options for initializing a project directory.
pub struct InitOptions {
  /// Project directory, created if missing
  pub project_path: PathBuf,
}

/// Result of a successful initialization.
#[derive(Debug)]
pub struct InitResult {
  /// The project directory (canonicalized)
  pub project_dir: PathBuf,
  /// Path to the written descriptor
  pub descriptor: PathBuf,
  /// Path to the store directory
  pub store_dir: PathBuf,
}

/// Initialize a project directory with the `lakecli` descriptor.
///
/// # Errors
///
/// Returns an error if:
/// - `lakeflake.toml` already exists
/// - Directory creation fails
/// - File writing fails
pub fn init(options: &InitOptions) -> Result<InitResult, InitError> {
  let project_path = &options.project_path;

  fs::create_dir_all(project_path).map_err(|e| InitError::CreateDir {
    path: project_path.clone(),
    source: e,
  })?;
  let project_dir = dunce::canonicalize(project_path).map_err(|e| InitError::Canonicalize {
    path: project_path.clone(),
    source: e,
  })?;

  let descriptor = project_dir.join(DESCRIPTOR_FILENAME);
  if descriptor.exists() {
    return Err(InitError::PathExists { path: descriptor });
  }

  let store_dir = store_dir();
  fs::create_dir_all(&store_dir).map_err(|e| InitError::CreateDir {
    path: store_dir.clone(),
    source: e,
  })?;

  fs::write(&descriptor, LAKECLI_DESCRIPTOR).map_err(|e| InitError::WriteFile {
    path: descriptor.clone(),
    source: e,
  })?;
  info!(path = %descriptor.display(), "wrote descriptor");

  Ok(InitResult {
    project_dir,
    descriptor,
    store_dir,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::consts::STORE_ENV;
  use crate::descriptor::Descriptor;
  use serial_test::serial;
  use tempfile::TempDir;

  #[test]
  #[serial]
  fn init_writes_loadable_descriptor() {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("project");
    let store = temp.path().join("store");

    temp_env::with_var(STORE_ENV, Some(store.to_str().unwrap()), || {
      let result = init(&InitOptions {
        project_path: project.clone(),
      })
      .unwrap();

      assert!(result.store_dir.exists());
      let descriptor = Descriptor::load(&result.descriptor).unwrap();
      assert_eq!(descriptor.package.name, "lakecli");
      assert_eq!(descriptor.root, result.project_dir);
    });
  }

  #[test]
  #[serial]
  fn init_fails_if_descriptor_exists() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(DESCRIPTOR_FILENAME), "# existing").unwrap();

    temp_env::with_var(STORE_ENV, Some(temp.path().join("store").to_str().unwrap()), || {
      let err = init(&InitOptions {
        project_path: temp.path().to_path_buf(),
      })
      .unwrap_err();

      assert!(matches!(err, InitError::PathExists { .. }));
      assert!(err.to_string().contains(DESCRIPTOR_FILENAME));
      let content = fs::read_to_string(temp.path().join(DESCRIPTOR_FILENAME)).unwrap();
      assert_eq!(content, "# existing");
    });
  }
}
