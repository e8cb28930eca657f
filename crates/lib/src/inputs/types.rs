//! Input types for declaration and resolution.
//!
//! - [`InputDecl`] - Parsed input declaration from a descriptor (before resolution)
//! - [`InputOverride`] - Override specification for transitive dependencies
//! - [`ResolvedInput`] - A fully resolved input with path, revision, and transitive deps

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Maximum depth for follows chain resolution.
/// Prevents infinite loops in malformed descriptors.
pub const MAX_FOLLOWS_DEPTH: usize = 10;

/// A parsed input declaration (before resolution).
///
/// Inputs can be declared in two forms:
///
/// ```toml
/// [inputs]
/// utils = "git:https://github.com/numtide/flake-utils.git"
///
/// [inputs.helper]
/// url = "git:https://github.com/nix-community/naersk.git"
/// inputs.pkgs.follows = "pkgs"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawInputDecl")]
pub enum InputDecl {
  /// Simple URL string.
  Url(String),

  /// Extended declaration with optional URL and input overrides.
  Extended {
    /// The URL of the input. `None` only makes sense for transitive overrides.
    url: Option<String>,
    /// Overrides for transitive dependencies.
    inputs: BTreeMap<String, InputOverride>,
  },
}

impl InputDecl {
  /// Get the URL from the declaration, if present.
  pub fn url(&self) -> Option<&str> {
    match self {
      InputDecl::Url(url) => Some(url),
      InputDecl::Extended { url, .. } => url.as_deref(),
    }
  }

  /// Get the input overrides, if any.
  pub fn overrides(&self) -> Option<&BTreeMap<String, InputOverride>> {
    match self {
      InputDecl::Url(_) => None,
      InputDecl::Extended { inputs, .. } if inputs.is_empty() => None,
      InputDecl::Extended { inputs, .. } => Some(inputs),
    }
  }
}

/// An override specification for a transitive dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOverride {
  /// Resolve the dependency from a different URL.
  Url(String),

  /// Reuse another input's resolved value.
  ///
  /// The path is either a root input name (`"pkgs"`) or a slash path to a
  /// transitive input (`"helper/pkgs"`).
  Follows(String),
}

impl InputOverride {
  pub fn is_follows(&self) -> bool {
    matches!(self, InputOverride::Follows(_))
  }

  pub fn follows_path(&self) -> Option<&str> {
    match self {
      InputOverride::Follows(path) => Some(path),
      InputOverride::Url(_) => None,
    }
  }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawInputDecl {
  Url(String),
  Extended {
    url: Option<String>,
    #[serde(default)]
    inputs: BTreeMap<String, RawOverride>,
  },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOverride {
  url: Option<String>,
  follows: Option<String>,
}

impl TryFrom<RawInputDecl> for InputDecl {
  type Error = String;

  fn try_from(raw: RawInputDecl) -> Result<Self, Self::Error> {
    match raw {
      RawInputDecl::Url(url) => Ok(InputDecl::Url(url)),
      RawInputDecl::Extended { url, inputs } => {
        let inputs = inputs
          .into_iter()
          .map(|(name, o)| match (o.url, o.follows) {
            (Some(url), None) => Ok((name, InputOverride::Url(url))),
            (None, Some(follows)) => Ok((name, InputOverride::Follows(follows))),
            (Some(_), Some(_)) => Err(format!("override for '{name}' sets both 'url' and 'follows'")),
            (None, None) => Err(format!("override for '{name}' needs 'url' or 'follows'")),
          })
          .collect::<Result<_, _>>()?;
        Ok(InputDecl::Extended { url, inputs })
      }
    }
  }
}

/// A resolved input ready for use.
///
/// Transitive inputs are shared handles: an input reached through `follows`
/// is the very same allocation as the input it follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInput {
  /// URL the input was resolved from (as declared).
  pub url: String,

  /// Absolute path to the input's root directory.
  pub path: PathBuf,

  /// The resolved revision (git commit hash or "local" for path inputs).
  pub rev: String,

  /// Resolved transitive dependencies, keyed by the name the input declares.
  pub inputs: ResolvedInputs,
}

impl ResolvedInput {
  pub fn new(url: impl Into<String>, path: PathBuf, rev: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      path,
      rev: rev.into(),
      inputs: BTreeMap::new(),
    }
  }

  pub fn with_inputs(mut self, inputs: ResolvedInputs) -> Self {
    self.inputs = inputs;
    self
  }

  /// The immutable identity of this input: where it came from and at which revision.
  pub fn pin(&self) -> InputPin {
    InputPin {
      url: self.url.clone(),
      rev: self.rev.clone(),
    }
  }
}

/// Map of input names to their resolved state.
pub type ResolvedInputs = BTreeMap<String, Arc<ResolvedInput>>;

/// Map of input names to their declarations.
pub type InputDecls = BTreeMap<String, InputDecl>;

/// Serializable identity of a resolved input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputPin {
  pub url: String,
  pub rev: String,
}
