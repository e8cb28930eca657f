//! Implementation of the `lakeflake build` command.
//!
//! This command evaluates the descriptor and realizes one package on the host
//! with the language toolchain.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::info;

use lakeflake_lib::build::{BuildConfig, realize};
use lakeflake_lib::eval::evaluate;
use lakeflake_lib::inputs::resolve::ResolveOptions;

use super::{load_descriptor, target_platform};
use crate::output::{OutputFormat, format_elapsed, print_json, print_stat, print_success, symbols, truncate_hash};

#[derive(Serialize)]
struct BuildReport {
  name: String,
  platform: String,
  store_path: String,
  binary: String,
  output_hash: String,
  cached: bool,
}

/// Execute the build command.
///
/// # Errors
///
/// Returns an error if evaluation fails, the platform is not the host, the
/// toolchain fails or the timeout elapses.
pub fn cmd_build(
  file: Option<&Path>,
  name: &str,
  system: Option<&str>,
  timeout: Option<Duration>,
  format: OutputFormat,
) -> Result<()> {
  let start = Instant::now();
  let platform = target_platform(system)?;
  let descriptor = load_descriptor(file)?;

  let eval = evaluate(&descriptor, &ResolveOptions::default()).context("Failed to evaluate descriptor")?;
  let spec = eval.package(&platform, name)?;
  let config = BuildConfig::for_host()?;

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let result = rt.block_on(async {
    match timeout {
      Some(limit) => match tokio::time::timeout(limit, realize(spec, &config)).await {
        Ok(result) => result.map_err(anyhow::Error::from),
        Err(_) => Err(anyhow!(
          "Build of '{}' timed out after {}",
          spec.name,
          humantime::format_duration(limit)
        )),
      },
      None => realize(spec, &config).await.map_err(anyhow::Error::from),
    }
  })?;
  info!(path = ?result.store_path, cached = result.cached, "build finished");

  if format.is_json() {
    return print_json(&BuildReport {
      name: spec.name.clone(),
      platform: platform.triple(),
      store_path: result.store_path.display().to_string(),
      binary: result.binary.display().to_string(),
      output_hash: result.output_hash.0.clone(),
      cached: result.cached,
    });
  }

  if result.cached {
    print_success(&format!("{} is up to date", spec.name.cyan()));
  } else {
    print_success(&format!("Built {}", spec.name.cyan()));
  }
  print_stat("Platform", &platform.triple());
  print_stat("Store path", &result.store_path.display().to_string());
  print_stat("Binary", &result.binary.display().to_string());
  print_stat("Output hash", truncate_hash(&result.output_hash.0));
  println!(
    "  {} Duration: {}",
    symbols::INFO.dimmed(),
    format_elapsed(start.elapsed()).dimmed()
  );

  Ok(())
}
