//! Implementation of the `lakeflake lock` command.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use lakeflake_lib::eval::lock;
use lakeflake_lib::inputs::lock::LOCK_FILENAME;
use lakeflake_lib::inputs::resolve::ResolveOptions;

use super::load_descriptor;
use super::update::print_changes;
use crate::output::{format_elapsed, symbols};

/// Resolve inputs, reusing locked revisions, and write the lock file if the
/// pins changed.
pub fn cmd_lock(file: Option<&Path>) -> Result<()> {
  let start = Instant::now();
  let descriptor = load_descriptor(file)?;

  let locked = lock(&descriptor, &ResolveOptions::default(), true).context("Failed to lock inputs")?;

  print_changes(&locked.resolution.changes, false);
  let lock_path = descriptor.root.join(LOCK_FILENAME);
  if locked.written {
    println!("{} Lock file written: {}", symbols::SUCCESS.green(), lock_path.display());
  } else {
    println!("{} Lock file is up to date.", symbols::SUCCESS.green());
  }
  println!(
    "  {} Duration: {}",
    symbols::INFO.dimmed(),
    format_elapsed(start.elapsed()).dimmed()
  );

  Ok(())
}

