//! Per-platform outputs: packages and development shells.
//!
//! For every supported platform a fresh [`PackageSet`] is created and the two
//! sibling outputs are composed from it independently:
//!
//! - [`package`]: the Build Output Specification, registered under the package
//!   name and under [`DEFAULT_OUTPUT`] as the same shared handle
//! - [`shell`]: the Development Environment Specification
//!
//! Platforms are composed in parallel; results are collected into ordered maps
//! so the serialized outputs do not depend on scheduling.

pub mod package;
pub mod shell;

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::descriptor::Descriptor;
use crate::inputs::ResolvedInput;
use crate::pkgs::{PackageError, PackageSet};
use crate::platform::Platform;
use crate::util::hash::ContentHash;

pub use package::{BuildSpec, compose_package};
pub use shell::{DevShellSpec, compose_dev_shell};

/// Alias every platform registers for its package and dev shell.
pub const DEFAULT_OUTPUT: &str = "default";

/// Inputs playing the roles composition needs.
#[derive(Debug, Clone)]
pub struct RoleInputs {
  pub package_set: Arc<ResolvedInput>,
  pub builder: Arc<ResolvedInput>,
}

/// Outputs of one platform.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformOutputs {
  pub packages: BTreeMap<String, Arc<BuildSpec>>,
  pub dev_shells: BTreeMap<String, Arc<DevShellSpec>>,
}

/// Outputs of every supported platform.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outputs {
  pub packages: BTreeMap<Platform, BTreeMap<String, Arc<BuildSpec>>>,
  pub dev_shells: BTreeMap<Platform, BTreeMap<String, Arc<DevShellSpec>>>,
}

/// Compose the outputs of one platform.
pub fn compose_platform(
  descriptor: &Descriptor,
  roles: &RoleInputs,
  platform: Platform,
  src_hash: &ContentHash,
) -> Result<PlatformOutputs, PackageError> {
  let pkgs = PackageSet::new(Arc::clone(&roles.package_set), platform);

  let package = Arc::new(compose_package(descriptor, &pkgs, &roles.builder, src_hash)?);
  let dev_shell = Arc::new(compose_dev_shell(descriptor, &pkgs)?);
  debug!(%platform, package = %package.name, "composed outputs");

  let packages = BTreeMap::from([
    (package.name.clone(), Arc::clone(&package)),
    (DEFAULT_OUTPUT.to_string(), package),
  ]);
  let mut dev_shells = BTreeMap::from([(dev_shell.name.clone(), Arc::clone(&dev_shell))]);
  dev_shells.entry(DEFAULT_OUTPUT.to_string()).or_insert(dev_shell);

  Ok(PlatformOutputs { packages, dev_shells })
}

/// Compose the outputs of every platform in `systems`.
pub fn compose_all(
  descriptor: &Descriptor,
  roles: &RoleInputs,
  systems: &[Platform],
  src_hash: &ContentHash,
) -> Result<Outputs, PackageError> {
  let per_platform: Vec<(Platform, PlatformOutputs)> = systems
    .par_iter()
    .map(|&platform| compose_platform(descriptor, roles, platform, src_hash).map(|o| (platform, o)))
    .collect::<Result<_, _>>()?;

  let mut outputs = Outputs::default();
  for (platform, platform_outputs) in per_platform {
    outputs.packages.insert(platform, platform_outputs.packages);
    outputs.dev_shells.insert(platform, platform_outputs.dev_shells);
  }
  Ok(outputs)
}

impl Outputs {
  pub fn platforms(&self) -> impl Iterator<Item = &Platform> {
    self.packages.keys()
  }

  pub fn supports(&self, platform: &Platform) -> bool {
    self.packages.contains_key(platform)
  }

  pub fn package(&self, platform: &Platform, name: &str) -> Option<&Arc<BuildSpec>> {
    self.packages.get(platform)?.get(name)
  }

  pub fn dev_shell(&self, platform: &Platform, name: &str) -> Option<&Arc<DevShellSpec>> {
    self.dev_shells.get(platform)?.get(name)
  }
}
