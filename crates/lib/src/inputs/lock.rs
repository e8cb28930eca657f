//! Lock file management for input resolution.
//!
//! The lock file (`lakeflake.lock`) pins every input in the dependency graph,
//! transitive ones included, so evaluation is reproducible. It lives next to
//! the descriptor.
//!
//! # Lock File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "root": "root",
//!   "nodes": {
//!     "root": { "inputs": { "helper": "helper", "pkgs": "pkgs" } },
//!     "pkgs": {
//!       "type": "git",
//!       "url": "git:https://github.com/NixOS/nixpkgs.git",
//!       "rev": "a1b2c3d4...",
//!       "lastModified": 1733667300
//!     },
//!     "helper": {
//!       "type": "git",
//!       "url": "git:https://github.com/nix-community/naersk.git",
//!       "rev": "e5f6a7b8...",
//!       "inputs": { "pkgs": ["pkgs"] }
//!     }
//!   }
//! }
//! ```
//!
//! A node input is either a node label or, for `follows`, the path it follows
//! as an array of segments.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current lock file format version.
pub const LOCK_VERSION: u32 = 1;

/// Lock file name.
pub const LOCK_FILENAME: &str = "lakeflake.lock";

/// Label of the root node.
pub const ROOT_NODE: &str = "root";

/// A lock file containing pinned input revisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockFile {
  /// Lock file format version.
  pub version: u32,
  /// Label of the root node.
  pub root: String,
  /// All nodes keyed by label. Input nodes are labeled by their input path.
  pub nodes: BTreeMap<String, LockNode>,
}

/// A node in the locked dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockNode {
  /// Input type: "git" or "path". Absent on the root node.
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub type_: Option<String>,

  /// Original URL from the descriptor.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,

  /// Pinned revision (git commit hash or "local" for path inputs).
  #[serde(skip_serializing_if = "Option::is_none")]
  pub rev: Option<String>,

  /// Unix timestamp of when the revision was pinned.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub last_modified: Option<u64>,

  /// Dependencies of this node.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub inputs: BTreeMap<String, LockRef>,
}

/// Reference from a node to one of its inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LockRef {
  /// The input resolved independently into the named node.
  Node(String),
  /// The input follows another input path (e.g. `["pkgs"]`).
  Follows(Vec<String>),
}

/// Errors that can occur when working with lock files.
#[derive(Debug, Error)]
pub enum LockError {
  #[error("failed to read lock file: {0}")]
  Read(#[source] io::Error),

  #[error("failed to write lock file: {0}")]
  Write(#[source] io::Error),

  #[error("failed to parse lock file: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("failed to serialize lock file: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("unsupported lock file version {0}, expected {LOCK_VERSION}")]
  UnsupportedVersion(u32),

  #[error("lock file root node '{0}' is missing")]
  MissingRoot(String),
}

impl Default for LockFile {
  fn default() -> Self {
    Self::new()
  }
}

impl LockFile {
  /// Create a lock file holding only an empty root node.
  pub fn new() -> Self {
    Self {
      version: LOCK_VERSION,
      root: ROOT_NODE.to_string(),
      nodes: BTreeMap::from([(ROOT_NODE.to_string(), LockNode::root(BTreeMap::new()))]),
    }
  }

  /// Load a lock file from the given path.
  ///
  /// Returns `Ok(None)` if the file doesn't exist.
  pub fn load(path: &Path) -> Result<Option<Self>, LockError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(LockError::Read(e)),
    };

    let lock: LockFile = serde_json::from_str(&content).map_err(LockError::Parse)?;

    if lock.version != LOCK_VERSION {
      return Err(LockError::UnsupportedVersion(lock.version));
    }
    if !lock.nodes.contains_key(&lock.root) {
      return Err(LockError::MissingRoot(lock.root));
    }

    Ok(Some(lock))
  }

  /// Save the lock file as pretty-printed JSON with a trailing newline.
  pub fn save(&self, path: &Path) -> Result<(), LockError> {
    let mut content = serde_json::to_string_pretty(self).map_err(LockError::Serialize)?;
    content.push('\n');
    fs::write(path, content).map_err(LockError::Write)?;
    Ok(())
  }

  /// Get a locked input node by its input path (e.g. `"helper/pkgs"`).
  pub fn get(&self, input_path: &str) -> Option<&LockNode> {
    if input_path == self.root {
      return None;
    }
    self.nodes.get(input_path)
  }

  /// Insert or replace a node.
  pub fn insert(&mut self, label: String, node: LockNode) {
    self.nodes.insert(label, node);
  }

  pub fn root_node(&self) -> Option<&LockNode> {
    self.nodes.get(&self.root)
  }

  /// Compare pins, ignoring timestamps.
  pub fn same_pins(&self, other: &LockFile) -> bool {
    let strip = |lock: &LockFile| -> BTreeMap<String, LockNode> {
      lock
        .nodes
        .iter()
        .map(|(label, node)| {
          let mut node = node.clone();
          node.last_modified = None;
          (label.clone(), node)
        })
        .collect()
    };
    self.root == other.root && strip(self) == strip(other)
  }
}

impl LockNode {
  /// Create a root node.
  pub fn root(inputs: BTreeMap<String, LockRef>) -> Self {
    Self {
      type_: None,
      url: None,
      rev: None,
      last_modified: None,
      inputs,
    }
  }

  /// Create an input node.
  pub fn input(type_: &str, url: &str, rev: &str, last_modified: Option<u64>, inputs: BTreeMap<String, LockRef>) -> Self {
    Self {
      type_: Some(type_.to_string()),
      url: Some(url.to_string()),
      rev: Some(rev.to_string()),
      last_modified,
      inputs,
    }
  }

  pub fn is_root(&self) -> bool {
    self.type_.is_none() && self.url.is_none()
  }
}
