//! Implementation of the `lakeflake init` command.
//!
//! This command writes the built-in `lakecli` descriptor to a project
//! directory and sets up the store.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use lakeflake_lib::init::{InitOptions, init};

use crate::output::symbols;

/// Execute the init command.
///
/// # Errors
///
/// Returns an error if a descriptor already exists or if there are permission issues.
pub fn cmd_init(path: &Path) -> Result<()> {
  let options = InitOptions {
    project_path: path.to_path_buf(),
  };

  let result = init(&options).context("Failed to initialize project")?;

  println!(
    "{} {}",
    symbols::SUCCESS.green(),
    "Initialized lakeflake project!".green().bold()
  );
  println!();
  println!(
    "  {} Project:    {}",
    symbols::INFO.cyan(),
    result.project_dir.display()
  );
  println!(
    "  {} Descriptor: {}",
    symbols::INFO.cyan(),
    result.descriptor.display()
  );
  println!("  {} Store:      {}", symbols::INFO.cyan(), result.store_dir.display());
  println!();
  println!("{}", "Next steps:".bold());
  println!("  1. Run: {}", "lakeflake lock".cyan());
  println!("  2. Run: {}", "lakeflake build".cyan());

  Ok(())
}
