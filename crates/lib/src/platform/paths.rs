//! Per-user directories.
//!
//! Directories follow the XDG base directory layout; only Linux and macOS are
//! supported hosts.

use std::env;
use std::path::PathBuf;

use crate::consts::{APP_NAME, STORE_ENV};

/// Returns the user's home directory, `/` if `HOME` is unset.
pub fn home_dir() -> PathBuf {
  env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/"))
}

/// `$var` if set and non-empty, otherwise `fallback` under the home directory.
fn xdg_dir(var: &str, fallback: &[&str]) -> PathBuf {
  match env::var_os(var) {
    Some(dir) if !dir.is_empty() => PathBuf::from(dir),
    _ => fallback.iter().fold(home_dir(), |path, part| path.join(part)),
  }
}

/// Returns the directory for data files for the application
pub fn data_dir() -> PathBuf {
  xdg_dir("XDG_DATA_HOME", &[".local", "share"]).join(APP_NAME)
}

/// Returns the directory for cache files for the application
pub fn cache_dir() -> PathBuf {
  xdg_dir("XDG_CACHE_HOME", &[".cache"]).join(APP_NAME)
}

/// Returns the checkout directory for fetched git inputs
pub fn inputs_cache_dir() -> PathBuf {
  cache_dir().join("inputs")
}

/// Returns the store holding realized build outputs.
///
/// `LAKEFLAKE_STORE` takes precedence over the data directory.
pub fn store_dir() -> PathBuf {
  if let Some(path) = env::var_os(STORE_ENV) {
    return PathBuf::from(path);
  }
  data_dir().join("store")
}
