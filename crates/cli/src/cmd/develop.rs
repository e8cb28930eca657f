//! Implementation of the `lakeflake develop` command.
//!
//! Prints a script that activates a dev shell when sourced, e.g.
//! `eval "$(lakeflake develop)"`.

use std::path::Path;

use anyhow::{Context, Result};

use lakeflake_lib::eval::evaluate;
use lakeflake_lib::inputs::resolve::ResolveOptions;
use lakeflake_lib::platform::shell::Shell;

use super::{load_descriptor, target_platform};

pub fn cmd_develop(file: Option<&Path>, name: &str, shell: Option<&str>, system: Option<&str>) -> Result<()> {
  let shell = match shell {
    Some(s) => s.parse::<Shell>()?,
    None => Shell::detect(),
  };
  let platform = target_platform(system)?;
  let descriptor = load_descriptor(file)?;

  let eval = evaluate(&descriptor, &ResolveOptions::default()).context("Failed to evaluate descriptor")?;
  let dev_shell = eval.dev_shell(&platform, name)?;

  print!("{}", dev_shell.activation_script(shell));
  Ok(())
}
