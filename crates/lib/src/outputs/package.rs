//! Build Output Specification composition.

use std::path::PathBuf;

use serde::Serialize;

use crate::descriptor::Descriptor;
use crate::inputs::{InputPin, ResolvedInput};
use crate::pkgs::{PackageError, PackageRef, PackageSet};
use crate::platform::Platform;
use crate::util::hash::{ContentHash, Hashable};

/// How to build the package for one platform.
///
/// Two specs composed from the same inputs for the same platform serialize to
/// identical bytes; the store path of a realized build is derived from that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSpec {
  pub name: String,
  pub platform: Platform,

  /// Absolute source root.
  pub src: PathBuf,

  /// Hash of the source tree, excluding VCS and build output directories.
  pub src_hash: ContentHash,

  /// Platform-conditional extra build inputs.
  pub build_inputs: Vec<PackageRef>,

  /// Toolchain invocation, run in `src`.
  pub command: Vec<String>,

  /// Pin of the build helper input.
  pub builder: InputPin,

  /// Pin of the package collection the build links against.
  pub package_set: InputPin,
}

impl Hashable for BuildSpec {}

/// Compose the build spec for the platform of `pkgs`.
pub fn compose_package(
  descriptor: &Descriptor,
  pkgs: &PackageSet,
  builder: &ResolvedInput,
  src_hash: &ContentHash,
) -> Result<BuildSpec, PackageError> {
  let platform = pkgs.platform();
  let build_inputs = pkgs.get_all(&descriptor.package.extra_inputs(&platform))?;

  Ok(BuildSpec {
    name: descriptor.package.name.clone(),
    platform,
    src: descriptor.src_dir(),
    src_hash: src_hash.clone(),
    build_inputs,
    command: descriptor.package.command(),
    builder: builder.pin(),
    package_set: pkgs.pin(),
  })
}

impl BuildSpec {
  /// Attribute paths of the extra build inputs.
  pub fn build_input_attrs(&self) -> Vec<&str> {
    self.build_inputs.iter().map(|p| p.attr.as_str()).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::arch::Arch;
  use crate::platform::os::Os;
  use std::path::Path;
  use std::sync::Arc;

  fn compose(platform: Platform) -> BuildSpec {
    let descriptor = Descriptor::lakecli(Path::new("/src/lakecli")).unwrap();
    let pkgs = PackageSet::new(
      Arc::new(ResolvedInput::new("path:./pkgs", "/pkgs".into(), "abc123")),
      platform,
    );
    let builder = ResolvedInput::new("path:./helper", "/helper".into(), "def456");
    compose_package(&descriptor, &pkgs, &builder, &ContentHash("0".repeat(64))).unwrap()
  }

  #[test]
  fn linux_has_no_extra_inputs() {
    let spec = compose(Platform::new(Arch::X86_64, Os::Linux));
    assert!(spec.build_inputs.is_empty());
    assert_eq!(spec.name, "lakecli");
    assert_eq!(spec.src, Path::new("/src/lakecli"));
  }

  #[test]
  fn darwin_links_system_frameworks() {
    let spec = compose(Platform::new(Arch::Aarch64, Os::Darwin));
    assert_eq!(
      spec.build_input_attrs(),
      vec![
        "darwin.apple_sdk.frameworks.CoreFoundation",
        "darwin.apple_sdk.frameworks.CoreServices",
        "darwin.apple_sdk.frameworks.SystemConfiguration",
      ]
    );
  }

  #[test]
  fn serialization_is_reproducible() {
    let platform = Platform::new(Arch::Aarch64, Os::Darwin);
    let a = serde_json::to_vec(&compose(platform)).unwrap();
    let b = serde_json::to_vec(&compose(platform)).unwrap();
    assert_eq!(a, b);
    assert_eq!(
      compose(platform).compute_hash().unwrap(),
      compose(platform).compute_hash().unwrap()
    );
  }

  #[test]
  fn pins_record_builder_and_package_set() {
    let spec = compose(Platform::new(Arch::X86_64, Os::Linux));
    assert_eq!(spec.builder.rev, "def456");
    assert_eq!(spec.package_set.rev, "abc123");
  }
}
