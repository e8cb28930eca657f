//! The project descriptor (`lakeflake.toml`).
//!
//! A descriptor is an immutable value: it is loaded once at the start of an
//! evaluation and threaded through everything that follows. It declares
//!
//! - `[inputs]`: pinned external inputs (see [`crate::inputs`])
//! - `[outputs]`: which input plays which role (package set, platform
//!   enumeration, build helper)
//! - `[package]`: the single buildable binary and its platform-conditional
//!   build inputs
//! - `[dev-shell]`: development shell packages and aliases
//!
//! Platform-conditional lists live under `os.<os>` tables and are appended to
//! the unconditional ones.

mod templates;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::consts::DESCRIPTOR_FILENAME;
use crate::inputs::InputDecls;
use crate::platform::Platform;
use crate::platform::os::Os;

pub use templates::LAKECLI_DESCRIPTOR;

/// Errors that can occur while loading a descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
  #[error("failed to read descriptor {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse descriptor {origin}: {source}")]
  Parse {
    origin: String,
    #[source]
    source: toml::de::Error,
  },

  #[error("failed to resolve descriptor directory {}: {source}", path.display())]
  Canonicalize {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("outputs.{role} names input '{input}', which is not declared")]
  UnknownRoleInput { role: &'static str, input: String },

  #[error("invalid input name '{0}': names cannot contain '/'")]
  InvalidInputName(String),

  #[error("package name cannot be empty")]
  EmptyPackageName,
}

/// A parsed descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Descriptor {
  #[serde(default)]
  pub description: Option<String>,

  #[serde(default)]
  pub inputs: InputDecls,

  #[serde(default)]
  pub outputs: OutputRoles,

  pub package: PackageDecl,

  #[serde(default)]
  pub dev_shell: DevShellDecl,

  /// Directory the descriptor lives in. Relative paths resolve against it.
  #[serde(skip)]
  pub root: PathBuf,
}

/// Input names for the roles evaluation needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct OutputRoles {
  /// The base package collection.
  pub package_set: String,
  /// The platform-enumeration utility.
  pub systems: String,
  /// The build helper.
  pub builder: String,
}

impl Default for OutputRoles {
  fn default() -> Self {
    Self {
      package_set: "pkgs".to_string(),
      systems: "utils".to_string(),
      builder: "helper".to_string(),
    }
  }
}

/// The buildable binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PackageDecl {
  pub name: String,

  /// Source root, relative to the descriptor directory.
  #[serde(default = "default_src")]
  pub src: PathBuf,

  /// Build inputs on every platform.
  #[serde(default)]
  pub build_inputs: Vec<String>,

  /// Toolchain invocation. Defaults to `cargo build --release --bin <name>`.
  #[serde(default)]
  pub command: Option<Vec<String>>,

  #[serde(default)]
  pub os: BTreeMap<Os, OsBuildInputs>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct OsBuildInputs {
  #[serde(default)]
  pub build_inputs: Vec<String>,
}

/// The development shell.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DevShellDecl {
  #[serde(default = "default_shell_name")]
  pub name: String,

  #[serde(default)]
  pub packages: Vec<String>,

  #[serde(default)]
  pub aliases: BTreeMap<String, String>,

  #[serde(default)]
  pub os: BTreeMap<Os, OsShellDecl>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct OsShellDecl {
  #[serde(default)]
  pub packages: Vec<String>,

  /// Replace unconditional aliases of the same name.
  #[serde(default)]
  pub aliases: BTreeMap<String, String>,
}

fn default_src() -> PathBuf {
  PathBuf::from(".")
}

fn default_shell_name() -> String {
  "default".to_string()
}

impl Default for DevShellDecl {
  fn default() -> Self {
    Self {
      name: default_shell_name(),
      packages: Vec::new(),
      aliases: BTreeMap::new(),
      os: BTreeMap::new(),
    }
  }
}

impl Descriptor {
  /// Parse descriptor content whose relative paths resolve against `root`.
  pub fn parse(content: &str, origin: &str, root: &Path) -> Result<Self, DescriptorError> {
    let mut descriptor: Descriptor = toml::from_str(content).map_err(|source| DescriptorError::Parse {
      origin: origin.to_string(),
      source,
    })?;
    descriptor.root = root.to_path_buf();
    descriptor.validate()?;
    Ok(descriptor)
  }

  /// Load a descriptor file.
  pub fn load(path: &Path) -> Result<Self, DescriptorError> {
    let content = fs::read_to_string(path).map_err(|source| DescriptorError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let parent = match path.parent() {
      Some(p) if !p.as_os_str().is_empty() => p,
      _ => Path::new("."),
    };
    let root = dunce::canonicalize(parent).map_err(|source| DescriptorError::Canonicalize {
      path: parent.to_path_buf(),
      source,
    })?;
    debug!(path = %path.display(), "loaded descriptor");
    Self::parse(&content, &path.display().to_string(), &root)
  }

  /// The built-in `lakecli` descriptor, rooted at `root`.
  pub fn lakecli(root: &Path) -> Result<Self, DescriptorError> {
    Self::parse(LAKECLI_DESCRIPTOR, "<built-in lakecli>", root)
  }

  /// Find the descriptor for an evaluation.
  ///
  /// An explicit `file` wins; otherwise `lakeflake.toml` in `dir`; otherwise
  /// the built-in `lakecli` descriptor rooted at `dir`.
  pub fn discover(file: Option<&Path>, dir: &Path) -> Result<Self, DescriptorError> {
    if let Some(file) = file {
      return Self::load(file);
    }
    let candidate = dir.join(DESCRIPTOR_FILENAME);
    if candidate.exists() {
      return Self::load(&candidate);
    }
    debug!(dir = %dir.display(), "no descriptor found, using built-in lakecli descriptor");
    let root = dunce::canonicalize(dir).map_err(|source| DescriptorError::Canonicalize {
      path: dir.to_path_buf(),
      source,
    })?;
    Self::lakecli(&root)
  }

  /// Absolute source root of the package.
  pub fn src_dir(&self) -> PathBuf {
    if self.package.src == Path::new(".") {
      return self.root.clone();
    }
    self.root.join(&self.package.src)
  }

  fn validate(&self) -> Result<(), DescriptorError> {
    if let Some(name) = self.inputs.keys().find(|n| n.contains('/')) {
      return Err(DescriptorError::InvalidInputName(name.clone()));
    }
    if self.package.name.trim().is_empty() {
      return Err(DescriptorError::EmptyPackageName);
    }

    let roles = [
      ("package-set", &self.outputs.package_set),
      ("systems", &self.outputs.systems),
      ("builder", &self.outputs.builder),
    ];
    for (role, input) in roles {
      if !self.inputs.contains_key(input) {
        return Err(DescriptorError::UnknownRoleInput {
          role,
          input: input.clone(),
        });
      }
    }
    Ok(())
  }
}

impl PackageDecl {
  /// Extra build inputs for a platform: the unconditional list followed by
  /// the list for the platform's OS, without duplicates.
  pub fn extra_inputs(&self, platform: &Platform) -> Vec<String> {
    let conditional = self.os.get(&platform.os).map(|o| o.build_inputs.as_slice()).unwrap_or_default();
    dedup(self.build_inputs.iter().chain(conditional))
  }

  /// The toolchain command line.
  pub fn command(&self) -> Vec<String> {
    self.command.clone().unwrap_or_else(|| {
      ["cargo", "build", "--release", "--bin", self.name.as_str()]
        .into_iter()
        .map(str::to_string)
        .collect()
    })
  }
}

impl DevShellDecl {
  /// Shell packages for a platform: base tools first, then OS extras.
  pub fn packages_for(&self, platform: &Platform) -> Vec<String> {
    let conditional = self.os.get(&platform.os).map(|o| o.packages.as_slice()).unwrap_or_default();
    dedup(self.packages.iter().chain(conditional))
  }

  /// Shell aliases for a platform.
  pub fn aliases_for(&self, platform: &Platform) -> BTreeMap<String, String> {
    let mut aliases = self.aliases.clone();
    if let Some(os) = self.os.get(&platform.os) {
      aliases.extend(os.aliases.clone());
    }
    aliases
  }
}

fn dedup<'a>(items: impl Iterator<Item = &'a String>) -> Vec<String> {
  let mut out: Vec<String> = Vec::new();
  for item in items {
    if !out.contains(item) {
      out.push(item.clone());
    }
  }
  out
}
