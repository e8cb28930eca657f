//! Implementation of the `lakeflake update` command.
//!
//! This command re-resolves inputs, ignoring their locked revisions, and
//! rewrites the lock file.

use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use owo_colors::OwoColorize;

use lakeflake_lib::eval::lock;
use lakeflake_lib::inputs::lock::LOCK_FILENAME;
use lakeflake_lib::inputs::resolve::{ForceUpdate, LockChange, ResolveOptions};

use super::load_descriptor;
use crate::output::{format_elapsed, symbols, truncate_hash};

/// Execute the update command.
///
/// # Arguments
///
/// * `file` - Optional descriptor path. If not provided, uses discovery.
/// * `inputs` - Root inputs to update. If empty, all inputs are updated.
/// * `dry_run` - If true, show what would change without writing the lock file.
///
/// # Errors
///
/// Returns an error if an input name is not declared or resolution fails.
pub fn cmd_update(file: Option<&Path>, inputs: Vec<String>, dry_run: bool) -> Result<()> {
  let start = Instant::now();
  let descriptor = load_descriptor(file)?;

  if let Some(unknown) = inputs.iter().find(|name| !descriptor.inputs.contains_key(*name)) {
    bail!("Unknown input '{}'", unknown);
  }

  let force_update = if inputs.is_empty() {
    ForceUpdate::All
  } else {
    ForceUpdate::Only(inputs.into_iter().collect::<HashSet<_>>())
  };
  let options = ResolveOptions {
    force_update,
    ..ResolveOptions::default()
  };

  let locked = lock(&descriptor, &options, !dry_run).context("Failed to update inputs")?;
  let changes = &locked.resolution.changes;

  if dry_run {
    println!("{}", "Dry run - no changes written".yellow());
    println!();
  }

  print_changes(changes, dry_run);

  if changes.is_empty() {
    println!("{} All inputs are up to date.", symbols::SUCCESS.green());
  } else if locked.written {
    println!();
    println!(
      "{} Lock file updated: {}",
      symbols::SUCCESS.green(),
      descriptor.root.join(LOCK_FILENAME).display()
    );
    println!(
      "  {} Duration: {}",
      symbols::INFO.dimmed(),
      format_elapsed(start.elapsed()).dimmed()
    );
  }

  Ok(())
}

/// Print one line per pin change, nested inputs indented under their parent.
pub(super) fn print_changes(changes: &[LockChange], dry_run: bool) {
  for change in changes {
    match change {
      LockChange::Added { path, rev } => {
        let prefix = if dry_run { "Would add" } else { "Added" };
        println!(
          "{}{} {}: {} ({})",
          indent(path),
          symbols::ADD.green(),
          prefix,
          path.cyan(),
          truncate_hash(rev).dimmed()
        );
      }
      LockChange::Updated { path, old_rev, new_rev } => {
        let prefix = if dry_run { "Would update" } else { "Updated" };
        println!(
          "{}{} {}: {} {} {}",
          indent(path),
          symbols::MODIFY.yellow(),
          prefix,
          path.cyan(),
          format!("{} {}", truncate_hash(old_rev), symbols::ARROW).dimmed(),
          truncate_hash(new_rev).green()
        );
      }
      LockChange::Removed { path } => {
        let prefix = if dry_run { "Would remove" } else { "Removed" };
        println!("{}{} {}: {}", indent(path), symbols::REMOVE.red(), prefix, path.cyan());
      }
    }
  }
}

fn indent(path: &str) -> String {
  "  ".repeat(path.matches('/').count() + 1)
}
