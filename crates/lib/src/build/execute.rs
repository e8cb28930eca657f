//! Toolchain invocation.
//!
//! The toolchain runs in the source root with a cleaned environment:
//! - Only `PATH`, `HOME`, `CARGO_HOME` and `RUSTUP_HOME` pass through
//! - `CARGO_TARGET_DIR` points at a scratch directory inside the store
//! - `out` is the directory that becomes the store entry
//! - `LAKEFLAKE_BUILD_INPUTS` lists the extra build inputs, space separated
//! - `SOURCE_DATE_EPOCH` is fixed for reproducible timestamps
//!
//! Dropping the realization future kills the toolchain.
//!
//! The binary is expected at `$CARGO_TARGET_DIR/release/<name>` and is copied
//! to `<store-entry>/bin/<name>`. The entry is moved into place only after the
//! toolchain succeeded, so a failed build leaves nothing behind.

use std::path::Path;

use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use super::store::{build_dir_path, verified_output, write_build_marker};
use super::{BuildConfig, BuildError, BuildResult};
use crate::outputs::BuildSpec;
use crate::util::hash::Hashable;

/// Environment variables passed through to the toolchain.
const PASSTHROUGH_ENV: &[&str] = &["PATH", "HOME", "CARGO_HOME", "RUSTUP_HOME"];

/// Lists the extra build inputs for the toolchain.
pub const BUILD_INPUTS_ENV: &str = "LAKEFLAKE_BUILD_INPUTS";

/// 315532800 = January 1, 1980 00:00:00 UTC (ZIP epoch)
const SOURCE_DATE_EPOCH: &str = "315532800";

/// Realize a package on the host.
///
/// # Errors
///
/// Returns [`BuildError`] if:
/// - The spec targets another platform than the host
/// - The toolchain cannot be started or exits unsuccessfully
/// - The toolchain succeeds without producing the binary
pub async fn realize(spec: &BuildSpec, config: &BuildConfig) -> Result<BuildResult, BuildError> {
  if spec.platform != config.host {
    return Err(BuildError::PlatformMismatch {
      requested: spec.platform,
      host: config.host,
    });
  }

  let hash = spec.compute_hash().map_err(BuildError::Hash)?;
  let store_path = build_dir_path(&config.store, &hash, &spec.name);
  let binary = store_path.join("bin").join(&spec.name);
  info!(name = %spec.name, platform = %spec.platform, hash = %hash, "realizing package");

  if store_path.exists() {
    if let Some(output_hash) = verified_output(&store_path) {
      debug!(path = ?store_path, "package already in store (cache hit)");
      return Ok(BuildResult {
        store_path,
        binary,
        output_hash,
        cached: true,
      });
    }
    debug!(path = ?store_path, "removing incomplete store entry");
    fs::remove_dir_all(&store_path).await?;
  }

  fs::create_dir_all(&config.store).await?;
  let scratch = tempfile::Builder::new().prefix(".build-").tempdir_in(&config.store)?;
  let out_dir = scratch.path().join("out");
  let target_dir = scratch.path().join("target");
  fs::create_dir_all(&out_dir).await?;

  run_toolchain(spec, &out_dir, &target_dir).await?;

  let artifact = target_dir.join("release").join(&spec.name);
  if !artifact.is_file() {
    return Err(BuildError::MissingArtifact(artifact));
  }
  fs::create_dir_all(out_dir.join("bin")).await?;
  fs::copy(&artifact, out_dir.join("bin").join(&spec.name)).await?;

  fs::rename(&out_dir, &store_path).await?;
  let output_hash = write_build_marker(&store_path)?;
  info!(path = ?store_path, "package realized");

  Ok(BuildResult {
    store_path,
    binary,
    output_hash,
    cached: false,
  })
}

async fn run_toolchain(spec: &BuildSpec, out_dir: &Path, target_dir: &Path) -> Result<(), BuildError> {
  let (program, args) = spec
    .command
    .split_first()
    .ok_or_else(|| BuildError::EmptyCommand(spec.name.clone()))?;

  let mut command = Command::new(program);
  command
    .args(args)
    .current_dir(&spec.src)
    .env_clear()
    .env("CARGO_TARGET_DIR", target_dir)
    .env("out", out_dir)
    .env(BUILD_INPUTS_ENV, spec.build_input_attrs().join(" "))
    .env("LANG", "C")
    .env("LC_ALL", "C")
    .env("SOURCE_DATE_EPOCH", SOURCE_DATE_EPOCH)
    .kill_on_drop(true);
  for name in PASSTHROUGH_ENV {
    if let Some(value) = std::env::var_os(name) {
      command.env(name, value);
    }
  }

  debug!(program = %program, src = ?spec.src, "spawning toolchain");
  let output = command.output().await.map_err(|source| BuildError::Spawn {
    program: program.clone(),
    source,
  })?;

  let stdout = String::from_utf8_lossy(&output.stdout);
  if !stdout.is_empty() {
    debug!(stdout = %stdout, "toolchain stdout");
  }

  if !output.status.success() {
    return Err(BuildError::Compile {
      name: spec.name.clone(),
      code: output.status.code(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    });
  }

  Ok(())
}
