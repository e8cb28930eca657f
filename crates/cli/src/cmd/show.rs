//! Implementation of the `lakeflake show` command.
//!
//! This command evaluates the descriptor and prints the package and dev shell
//! of every supported platform.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use lakeflake_lib::eval::evaluate;
use lakeflake_lib::inputs::resolve::ResolveOptions;
use lakeflake_lib::util::hash::Hashable;

use super::load_descriptor;
use crate::output::{OutputFormat, print_json, symbols, truncate_hash};

pub fn cmd_show(file: Option<&Path>, format: OutputFormat) -> Result<()> {
  let descriptor = load_descriptor(file)?;
  let eval = evaluate(&descriptor, &ResolveOptions::default()).context("Failed to evaluate descriptor")?;

  if format.is_json() {
    return print_json(&eval.outputs);
  }

  println!("{}", "Inputs:".bold());
  for (name, input) in &eval.inputs {
    println!("  {} {} {}", symbols::INFO.cyan(), name, input.url.dimmed());
    println!("      rev: {}", truncate_hash(&input.rev));
  }

  for platform in eval.outputs.platforms() {
    println!();
    println!("{}", platform.triple().bold());

    if let Some(packages) = eval.outputs.packages.get(platform) {
      for (name, spec) in packages {
        let hash = spec.compute_hash().context("Failed to hash build spec")?;
        println!(
          "  {} packages.{} {}",
          symbols::ARROW.green(),
          name,
          truncate_hash(&hash.0).dimmed()
        );
        if !spec.build_inputs.is_empty() {
          println!("      build inputs: {}", spec.build_input_attrs().join(", "));
        }
      }
    }

    if let Some(shells) = eval.outputs.dev_shells.get(platform) {
      for (name, shell) in shells {
        println!("  {} devShells.{}", symbols::ARROW.green(), name);
        println!("      packages: {}", shell.package_attrs().join(", "));
        if !shell.aliases.is_empty() {
          let aliases: Vec<&str> = shell.aliases.keys().map(String::as_str).collect();
          println!("      aliases: {}", aliases.join(", "));
        }
      }
    }
  }

  Ok(())
}
