//! Development Environment Specification composition.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::descriptor::Descriptor;
use crate::pkgs::{PackageError, PackageRef, PackageSet};
use crate::platform::Platform;
use crate::platform::shell::Shell;

/// Set by the activation script to the name of the active dev shell.
pub const SHELL_ENV: &str = "LAKEFLAKE_SHELL";

/// Set by the activation script to the space-separated package list.
pub const SHELL_PACKAGES_ENV: &str = "LAKEFLAKE_SHELL_PACKAGES";

/// A development shell for one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DevShellSpec {
  pub name: String,
  pub platform: Platform,
  /// Base tools first, then platform extras.
  pub packages: Vec<PackageRef>,
  pub aliases: BTreeMap<String, String>,
}

/// Compose the dev shell for the platform of `pkgs`.
pub fn compose_dev_shell(descriptor: &Descriptor, pkgs: &PackageSet) -> Result<DevShellSpec, PackageError> {
  let platform = pkgs.platform();
  let shell = &descriptor.dev_shell;

  Ok(DevShellSpec {
    name: shell.name.clone(),
    platform,
    packages: pkgs.get_all(&shell.packages_for(&platform))?,
    aliases: shell.aliases_for(&platform),
  })
}

impl DevShellSpec {
  pub fn package_attrs(&self) -> Vec<&str> {
    self.packages.iter().map(|p| p.attr.as_str()).collect()
  }

  /// Script that enters this shell when sourced by `shell`.
  ///
  /// Aliases only exist in the session that sources the script.
  pub fn activation_script(&self, shell: Shell) -> String {
    let mut lines = vec![
      shell.comment(&format!("lakeflake dev shell '{}' ({})", self.name, self.platform)),
      shell.export_var(SHELL_ENV, &self.name),
      shell.export_var(SHELL_PACKAGES_ENV, &self.package_attrs().join(" ")),
    ];
    for (name, command) in &self.aliases {
      lines.push(shell.alias(name, command));
    }

    let mut script = lines.join("\n");
    script.push('\n');
    script
  }
}
