//! Descriptor evaluation.
//!
//! Evaluation turns an immutable [`Descriptor`] into [`Outputs`]:
//! 1. Resolve the declared inputs, consulting and updating the lock file
//! 2. Enumerate platforms from the platform-enumeration input
//! 3. Hash the package source tree once
//! 4. Compose the package and dev shell of every platform
//!
//! Any failure aborts the whole evaluation; there are no partial outputs.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::descriptor::{Descriptor, DescriptorError};
use crate::inputs::ResolvedInputs;
use crate::inputs::resolve::{LockChange, ResolutionResult, ResolveError, ResolveOptions, resolve_inputs, save_lock_file_if_changed};
use crate::outputs::{BuildSpec, DevShellSpec, Outputs, RoleInputs, compose_all};
use crate::pkgs::PackageError;
use crate::platform::Platform;
use crate::platform::systems::{SystemsError, enumerate_systems};
use crate::util::hash::{SOURCE_EXCLUSIONS, TreeHashError, hash_tree};

/// Errors that can occur during evaluation.
#[derive(Debug, Error)]
pub enum EvalError {
  #[error(transparent)]
  Descriptor(#[from] DescriptorError),

  /// Input resolution error.
  #[error("input resolution error: {0}")]
  Resolve(#[from] ResolveError),

  #[error("platform enumeration failed: {0}")]
  Systems(#[from] SystemsError),

  #[error("failed to hash source tree {path}: {source}")]
  SourceHash {
    path: String,
    #[source]
    source: TreeHashError,
  },

  #[error(transparent)]
  Package(#[from] PackageError),

  #[error("outputs.{role} input '{input}' was not resolved")]
  MissingRoleInput { role: &'static str, input: String },

  /// The platform-enumeration input does not list the requested platform.
  #[error("platform {platform} is not supported (supported: {supported})")]
  UnsupportedPlatform { platform: Platform, supported: String },

  #[error("no {kind} named '{name}' for {platform}")]
  UnknownOutput {
    kind: &'static str,
    name: String,
    platform: Platform,
  },
}

/// Result of resolving and locking a descriptor's inputs.
#[derive(Debug)]
pub struct Locked {
  pub resolution: ResolutionResult,
  /// Whether the lock file was written.
  pub written: bool,
}

/// A fully evaluated descriptor.
#[derive(Debug)]
pub struct Evaluation {
  pub inputs: ResolvedInputs,
  pub systems: Vec<Platform>,
  pub outputs: Outputs,
  pub changes: Vec<LockChange>,
  pub lock_written: bool,
}

/// Resolve a descriptor's inputs and write the lock file if it changed and
/// `write` is set.
pub fn lock(descriptor: &Descriptor, options: &ResolveOptions, write: bool) -> Result<Locked, EvalError> {
  let resolution = resolve_inputs(&descriptor.inputs, &descriptor.root, options)?;
  let written = if write {
    save_lock_file_if_changed(&resolution, &descriptor.root)?
  } else {
    false
  };
  Ok(Locked { resolution, written })
}

/// Evaluate a descriptor for every supported platform.
///
/// # Errors
///
/// Returns [`EvalError`] if input resolution, platform enumeration, source
/// hashing or package lookup fails.
pub fn evaluate(descriptor: &Descriptor, options: &ResolveOptions) -> Result<Evaluation, EvalError> {
  let Locked { resolution, written } = lock(descriptor, options, true)?;
  let inputs = resolution.inputs;

  let role = |role: &'static str, input: &String| {
    inputs.get(input).cloned().ok_or_else(|| EvalError::MissingRoleInput {
      role,
      input: input.clone(),
    })
  };
  let roles = RoleInputs {
    package_set: role("package-set", &descriptor.outputs.package_set)?,
    builder: role("builder", &descriptor.outputs.builder)?,
  };
  let systems_input = role("systems", &descriptor.outputs.systems)?;

  let systems = enumerate_systems(&systems_input)?;
  debug!(systems = ?systems.iter().map(Platform::triple).collect::<Vec<_>>(), "supported platforms");

  let src = descriptor.src_dir();
  let src_hash = hash_tree(&src, SOURCE_EXCLUSIONS).map_err(|source| EvalError::SourceHash {
    path: src.display().to_string(),
    source,
  })?;

  let outputs = compose_all(descriptor, &roles, &systems, &src_hash)?;
  info!(
    package = %descriptor.package.name,
    platforms = systems.len(),
    "evaluated descriptor"
  );

  Ok(Evaluation {
    inputs,
    systems,
    outputs,
    changes: resolution.changes,
    lock_written: written,
  })
}

impl Evaluation {
  fn check_supported(&self, platform: &Platform) -> Result<(), EvalError> {
    if self.outputs.supports(platform) {
      return Ok(());
    }
    Err(EvalError::UnsupportedPlatform {
      platform: *platform,
      supported: self.systems.iter().map(Platform::triple).collect::<Vec<_>>().join(", "),
    })
  }

  /// The package `name` for `platform`.
  pub fn package(&self, platform: &Platform, name: &str) -> Result<&Arc<BuildSpec>, EvalError> {
    self.check_supported(platform)?;
    self.outputs.package(platform, name).ok_or_else(|| EvalError::UnknownOutput {
      kind: "package",
      name: name.to_string(),
      platform: *platform,
    })
  }

  /// The dev shell `name` for `platform`.
  pub fn dev_shell(&self, platform: &Platform, name: &str) -> Result<&Arc<DevShellSpec>, EvalError> {
    self.check_supported(platform)?;
    self.outputs.dev_shell(platform, name).ok_or_else(|| EvalError::UnknownOutput {
      kind: "dev shell",
      name: name.to_string(),
      platform: *platform,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::consts::DESCRIPTOR_FILENAME;
  use crate::descriptor::LAKECLI_DESCRIPTOR;
  use crate::inputs::lock::{LOCK_FILENAME, LockFile, LockRef};
  use crate::inputs::resolve::ForceUpdate;
  use crate::outputs::DEFAULT_OUTPUT;
  use crate::platform::systems::SYSTEMS_FILENAME;
  use std::fs;
  use tempfile::TempDir;

  /// A lakecli project whose inputs are local directories.
  fn project() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    for dir in ["inputs/pkgs", "inputs/utils", "inputs/helper", "src"] {
      fs::create_dir_all(root.join(dir)).unwrap();
    }
    fs::write(root.join("src/main.rs"), "fn main() {}\n").unwrap();
    fs::write(
      root.join("inputs/utils").join(SYSTEMS_FILENAME),
      r#"["x86_64-linux", "aarch64-darwin"]"#,
    )
    .unwrap();
    fs::write(
      root.join("inputs/helper").join(DESCRIPTOR_FILENAME),
      "[inputs]\npkgs = \"path:../does-not-exist\"\n",
    )
    .unwrap();

    let descriptor = LAKECLI_DESCRIPTOR
      .replace(
        "git:https://github.com/NixOS/nixpkgs.git#nixpkgs-unstable",
        "path:./inputs/pkgs",
      )
      .replace("git:https://github.com/numtide/flake-utils.git", "path:./inputs/utils")
      .replace("git:https://github.com/nix-community/naersk.git", "path:./inputs/helper");
    fs::write(root.join(DESCRIPTOR_FILENAME), descriptor).unwrap();
    temp
  }

  fn options(temp: &TempDir) -> ResolveOptions {
    ResolveOptions {
      force_update: ForceUpdate::None,
      cache_dir: temp.path().join("cache"),
    }
  }

  fn evaluate_project(temp: &TempDir) -> Evaluation {
    let descriptor = Descriptor::discover(None, temp.path()).unwrap();
    evaluate(&descriptor, &options(temp)).unwrap()
  }

  #[test]
  fn builder_follows_top_level_package_set() {
    let temp = project();
    let eval = evaluate_project(&temp);

    assert!(Arc::ptr_eq(&eval.inputs["helper"].inputs["pkgs"], &eval.inputs["pkgs"]));
  }

  #[test]
  fn evaluates_enumerated_platforms_only() {
    let temp = project();
    let eval = evaluate_project(&temp);

    let triples: Vec<String> = eval.systems.iter().map(Platform::triple).collect();
    assert_eq!(triples, vec!["x86_64-linux", "aarch64-darwin"]);

    let unsupported: Platform = "aarch64-linux".parse().unwrap();
    assert!(matches!(
      eval.package(&unsupported, DEFAULT_OUTPUT),
      Err(EvalError::UnsupportedPlatform { .. })
    ));
  }

  #[test]
  fn platform_conditional_outputs() {
    let temp = project();
    let eval = evaluate_project(&temp);
    let linux: Platform = "x86_64-linux".parse().unwrap();
    let darwin: Platform = "aarch64-darwin".parse().unwrap();

    assert!(eval.package(&linux, "lakecli").unwrap().build_inputs.is_empty());
    assert_eq!(eval.package(&darwin, "lakecli").unwrap().build_inputs.len(), 3);

    let linux_shell = eval.dev_shell(&linux, DEFAULT_OUTPUT).unwrap();
    let darwin_shell = eval.dev_shell(&darwin, DEFAULT_OUTPUT).unwrap();
    assert_eq!(darwin_shell.packages.len(), linux_shell.packages.len() + 2);

    assert!(Arc::ptr_eq(
      eval.package(&darwin, DEFAULT_OUTPUT).unwrap(),
      eval.package(&darwin, "lakecli").unwrap()
    ));
    assert!(matches!(
      eval.package(&linux, "other"),
      Err(EvalError::UnknownOutput { .. })
    ));
  }

  #[test]
  fn evaluation_writes_lock_with_follows() {
    let temp = project();
    let eval = evaluate_project(&temp);
    assert!(eval.lock_written);

    let lock = LockFile::load(&temp.path().join(LOCK_FILENAME)).unwrap().unwrap();
    assert_eq!(
      lock.get("helper").unwrap().inputs["pkgs"],
      LockRef::Follows(vec!["pkgs".to_string()])
    );
  }

  #[test]
  fn repeated_evaluation_is_byte_identical() {
    let temp = project();
    let first = evaluate_project(&temp);
    let second = evaluate_project(&temp);
    assert!(!second.lock_written);

    let darwin: Platform = "aarch64-darwin".parse().unwrap();
    let a = serde_json::to_vec(first.package(&darwin, "lakecli").unwrap()).unwrap();
    let b = serde_json::to_vec(second.package(&darwin, "lakecli").unwrap()).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn unreachable_input_aborts_evaluation() {
    let temp = project();
    fs::remove_dir_all(temp.path().join("inputs/utils")).unwrap();
    let descriptor = Descriptor::discover(None, temp.path()).unwrap();

    assert!(matches!(
      evaluate(&descriptor, &options(&temp)),
      Err(EvalError::Resolve(ResolveError::Fetch { .. }))
    ));
    assert!(!temp.path().join(LOCK_FILENAME).exists());
  }

  #[test]
  fn lock_without_write_leaves_no_file() {
    let temp = project();
    let descriptor = Descriptor::discover(None, temp.path()).unwrap();

    let locked = lock(&descriptor, &options(&temp), false).unwrap();
    assert!(locked.resolution.lock_changed);
    assert!(!locked.written);
    assert!(!temp.path().join(LOCK_FILENAME).exists());
  }
}
