//! Input resolution orchestration.
//!
//! This module coordinates the full input resolution flow:
//! 1. Discover inputs breadth-first, starting from the descriptor's `[inputs]`
//! 2. Check the lock file for pinned revisions
//! 3. Fetch/resolve each source input (git clone/fetch or path resolution) and
//!    read its own descriptor for transitive inputs
//! 4. Resolve `follows` and assemble shared [`ResolvedInput`] handles
//! 5. Rebuild the lock file from the graph
//!
//! # Revision selection
//!
//! For each source input:
//! - If locked and the URL matches (fragment included): use the locked revision
//! - If locked but the URL differs: error (requires `lakeflake update`)
//! - If not locked, or being updated: use the URL's rev (`#v1.0.0`) if it has
//!   one, otherwise the remote's default branch, and record the commit
//!
//! # Follows scope
//!
//! Follows paths written in the project descriptor are absolute input paths.
//! Follows paths written in an input's own descriptor are relative to that
//! input (`pkgs` inside `helper` means `helper/pkgs`).

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::fetch::{FetchError, LOCAL_REV, cache_key, fetch_git, read_git_file, read_path_file, resolve_path};
use super::graph::{DependencyGraph, GraphError, NodeKind, join_path};
use super::lock::{LOCK_FILENAME, LockError, LockFile, LockNode, LockRef, ROOT_NODE};
use super::source::{InputSource, ParseError, parse, source_type};
use super::types::{InputDecls, InputOverride, ResolvedInput, ResolvedInputs};
use crate::consts::DESCRIPTOR_FILENAME;
use crate::platform::paths::inputs_cache_dir;

/// Which inputs ignore the lock file.
#[derive(Debug, Clone, Default)]
pub enum ForceUpdate {
  /// Use locked revisions when available.
  #[default]
  None,
  /// Re-resolve every input.
  All,
  /// Re-resolve the named root inputs and everything below them.
  Only(HashSet<String>),
}

impl ForceUpdate {
  fn applies_to(&self, path: &str) -> bool {
    match self {
      ForceUpdate::None => false,
      ForceUpdate::All => true,
      ForceUpdate::Only(names) => {
        let root = path.split('/').next().unwrap_or(path);
        names.contains(path) || names.contains(root)
      }
    }
  }
}

/// Options controlling input resolution.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
  pub force_update: ForceUpdate,
  /// Where git inputs are checked out.
  pub cache_dir: PathBuf,
}

impl Default for ResolveOptions {
  fn default() -> Self {
    Self {
      force_update: ForceUpdate::None,
      cache_dir: inputs_cache_dir(),
    }
  }
}

/// A change between the previous and the new lock file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockChange {
  Added { path: String, rev: String },
  Updated { path: String, old_rev: String, new_rev: String },
  Removed { path: String },
}

/// Result of input resolution.
#[derive(Debug)]
pub struct ResolutionResult {
  /// Root-level inputs ready for use.
  pub inputs: ResolvedInputs,
  /// Lock file rebuilt from the resolved graph.
  pub lock_file: LockFile,
  /// Whether the lock file should be written.
  pub lock_changed: bool,
  /// Pin changes relative to the previous lock file.
  pub changes: Vec<LockChange>,
}

/// Errors that can occur during input resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("failed to parse input '{name}': {source}")]
  Parse {
    name: String,
    #[source]
    source: ParseError,
  },

  #[error("input '{name}' has no url")]
  MissingUrl { name: String },

  #[error("input '{name}' URL changed from '{locked_url}' to '{config_url}'. Run 'lakeflake update {name}' to update.")]
  LockMismatch {
    name: String,
    locked_url: String,
    config_url: String,
  },

  #[error("failed to fetch input '{name}': {source}")]
  Fetch {
    name: String,
    #[source]
    source: FetchError,
  },

  #[error("failed to read inputs declared by '{name}': {source}")]
  InputDescriptor {
    name: String,
    #[source]
    source: toml::de::Error,
  },

  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error("failed to load lock file: {0}")]
  LoadLock(#[source] LockError),

  #[error("failed to save lock file: {0}")]
  SaveLock(#[source] LockError),
}

/// An input waiting to be fetched.
struct Pending {
  path: String,
  url: String,
  /// Directory relative `path:` URLs resolve against.
  base_dir: PathBuf,
  /// Overrides for this input's children.
  overrides: BTreeMap<String, InputOverride>,
  /// Input path the overrides were written in ("" for the project).
  override_scope: String,
  /// Directory relative `path:` URLs in the overrides resolve against.
  override_base: PathBuf,
  /// Checkouts of the inputs above this one, with their paths.
  ancestors: Vec<(String, PathBuf, String)>,
}

/// A source input after fetching.
struct Fetched {
  url: String,
  type_: &'static str,
  path: PathBuf,
  rev: String,
  last_modified: u64,
}

#[derive(Deserialize)]
struct DeclaredInputs {
  #[serde(default)]
  inputs: InputDecls,
}

/// Resolve all inputs declared by a descriptor living in `base_dir`.
///
/// # Errors
///
/// Returns [`ResolveError`] if:
/// - An input URL cannot be parsed or is missing
/// - A locked input's URL doesn't match the descriptor
/// - Fetching an input fails or a revision cannot be found
/// - A follows path is invalid, missing or circular
pub fn resolve_inputs(decls: &InputDecls, base_dir: &Path, options: &ResolveOptions) -> Result<ResolutionResult, ResolveError> {
  let lock_path = base_dir.join(LOCK_FILENAME);
  let previous = LockFile::load(&lock_path).map_err(ResolveError::LoadLock)?;
  let lock_file = previous.clone().unwrap_or_default();

  info!(count = decls.len(), "resolving inputs");

  let mut graph = DependencyGraph::new();
  let mut queue = VecDeque::new();

  for (name, decl) in decls {
    let url = decl
      .url()
      .ok_or_else(|| ResolveError::MissingUrl { name: name.clone() })?;
    graph.add(name, "", NodeKind::Source { url: url.to_string() });
    queue.push_back(Pending {
      path: name.clone(),
      url: url.to_string(),
      base_dir: base_dir.to_path_buf(),
      overrides: decl.overrides().cloned().unwrap_or_default(),
      override_scope: String::new(),
      override_base: base_dir.to_path_buf(),
      ancestors: Vec::new(),
    });
  }

  let mut fetched: BTreeMap<String, Fetched> = BTreeMap::new();

  while let Some(pending) = queue.pop_front() {
    let input = fetch_one(&pending, &lock_file, options)?;

    // An input that (transitively) declares itself would never stop expanding.
    if let Some((first, ..)) = pending
      .ancestors
      .iter()
      .find(|(_, path, rev)| *path == input.path && *rev == input.rev)
    {
      let mut chain: Vec<&str> = pending
        .ancestors
        .iter()
        .map(|(p, ..)| p.as_str())
        .skip_while(|p| *p != first.as_str())
        .collect();
      chain.push(&pending.path);
      return Err(ResolveError::Graph(GraphError::Cycle {
        path: pending.path.clone(),
        chain: chain.join(" -> "),
      }));
    }

    let declared = declared_inputs(&pending.path, &input)?;
    let mut ancestors = pending.ancestors.clone();
    ancestors.push((pending.path.clone(), input.path.clone(), input.rev.clone()));

    let names: BTreeSet<&String> = declared.keys().chain(pending.overrides.keys()).collect();
    for name in names {
      let child_path = join_path(&pending.path, name);
      let child_decl = declared.get(name);
      let grandchild_overrides = child_decl.and_then(|d| d.overrides()).cloned().unwrap_or_default();

      let url = match pending.overrides.get(name) {
        Some(InputOverride::Follows(target)) => {
          let target = join_path(&pending.override_scope, target.trim_matches('/'));
          debug!(input = %child_path, %target, "input follows");
          graph.add(name, &pending.path, NodeKind::Follows { target });
          continue;
        }
        Some(InputOverride::Url(url)) => {
          if child_decl.is_none() {
            warn!(input = %pending.path, name = %name, "override for an input that is not declared");
          }
          queue.push_back(Pending {
            path: child_path.clone(),
            url: url.clone(),
            base_dir: pending.override_base.clone(),
            overrides: grandchild_overrides,
            override_scope: pending.path.clone(),
            override_base: input.path.clone(),
            ancestors: ancestors.clone(),
          });
          url.clone()
        }
        None => {
          let url = child_decl
            .and_then(|d| d.url())
            .ok_or_else(|| ResolveError::MissingUrl { name: child_path.clone() })?
            .to_string();
          queue.push_back(Pending {
            path: child_path.clone(),
            url: url.clone(),
            base_dir: input.path.clone(),
            overrides: grandchild_overrides,
            override_scope: pending.path.clone(),
            override_base: input.path.clone(),
            ancestors: ancestors.clone(),
          });
          url
        }
      };
      graph.add(name, &pending.path, NodeKind::Source { url });
    }

    fetched.insert(pending.path.clone(), input);
  }

  graph.resolve_follows()?;
  let order = graph.build_order()?;

  // Children are built before parents, so every handle a parent needs exists.
  let mut handles: HashMap<String, Arc<ResolvedInput>> = HashMap::new();
  for path in &order {
    let input = &fetched[path];
    let children: ResolvedInputs = graph
      .children(path)
      .into_iter()
      .map(|child| {
        let name = graph.nodes[child].name.clone();
        (name, Arc::clone(&handles[graph.source_of(child)]))
      })
      .collect();
    let resolved = ResolvedInput::new(input.url.clone(), input.path.clone(), input.rev.clone()).with_inputs(children);
    handles.insert(path.clone(), Arc::new(resolved));
  }

  let inputs: ResolvedInputs = decls
    .keys()
    .map(|name| (name.clone(), Arc::clone(&handles[graph.source_of(name)])))
    .collect();

  let new_lock = build_lock(&graph, &fetched);
  let changes = diff_locks(previous.as_ref(), &new_lock);
  for change in &changes {
    if let LockChange::Removed { path } = change {
      warn!(input = %path, "removing stale input from lock file");
    }
  }
  let lock_changed = previous.as_ref().is_none_or(|old| !old.same_pins(&new_lock));

  Ok(ResolutionResult {
    inputs,
    lock_file: new_lock,
    lock_changed,
    changes,
  })
}

fn fetch_one(pending: &Pending, lock_file: &LockFile, options: &ResolveOptions) -> Result<Fetched, ResolveError> {
  let name = &pending.path;
  debug!(input = %name, url = %pending.url, "resolving input");

  let source = parse(&pending.url).map_err(|e| ResolveError::Parse {
    name: name.clone(),
    source: e,
  })?;

  let locked = lock_file.get(name);
  let force = options.force_update.applies_to(name);

  if !force
    && let Some(locked_url) = locked.and_then(|l| l.url.as_deref())
    && locked_url != pending.url
  {
    return Err(ResolveError::LockMismatch {
      name: name.clone(),
      locked_url: locked_url.to_string(),
      config_url: pending.url.clone(),
    });
  }

  let type_ = source_type(&source);
  let (path, rev) = match source {
    InputSource::Git { url, rev: config_rev } => {
      let pinned = locked
        .filter(|l| !force && l.url.as_deref() == Some(pending.url.as_str()))
        .and_then(|l| l.rev.clone());
      let target_rev = pinned.or(config_rev);
      fetch_git(&cache_key(name, &url), &url, target_rev.as_deref(), &options.cache_dir).map_err(|e| {
        ResolveError::Fetch {
          name: name.clone(),
          source: e,
        }
      })?
    }
    InputSource::Path { path } => {
      let resolved = resolve_path(&path.to_string_lossy(), &pending.base_dir).map_err(|e| ResolveError::Fetch {
        name: name.clone(),
        source: e,
      })?;
      (resolved, LOCAL_REV.to_string())
    }
  };

  let unchanged = locked
    .filter(|l| l.rev.as_deref() == Some(rev.as_str()))
    .and_then(|l| l.last_modified);
  let last_modified = match unchanged {
    Some(timestamp) => timestamp,
    None => {
      if type_ == "git" {
        info!(input = %name, %rev, "locking input");
      }
      now()
    }
  };

  Ok(Fetched {
    url: pending.url.clone(),
    type_,
    path,
    rev,
    last_modified,
  })
}

/// Inputs declared by the descriptor inside a fetched input, if it has one.
fn declared_inputs(name: &str, input: &Fetched) -> Result<InputDecls, ResolveError> {
  let content = if input.type_ == "git" {
    read_git_file(&input.path, &input.rev, DESCRIPTOR_FILENAME)
  } else {
    read_path_file(&input.path, DESCRIPTOR_FILENAME)
  }
  .map_err(|e| ResolveError::Fetch {
    name: name.to_string(),
    source: e,
  })?;

  let Some(content) = content else {
    return Ok(InputDecls::new());
  };
  let declared: DeclaredInputs = toml::from_str(&content).map_err(|e| ResolveError::InputDescriptor {
    name: name.to_string(),
    source: e,
  })?;
  Ok(declared.inputs)
}

fn build_lock(graph: &DependencyGraph, fetched: &BTreeMap<String, Fetched>) -> LockFile {
  let node_inputs = |path: &str| -> BTreeMap<String, LockRef> {
    graph
      .children(path)
      .into_iter()
      .map(|child| {
        let node = &graph.nodes[child];
        let reference = if node.is_follows() {
          LockRef::Follows(graph.source_of(child).split('/').map(str::to_string).collect())
        } else {
          LockRef::Node(child.to_string())
        };
        (node.name.clone(), reference)
      })
      .collect()
  };

  let mut lock = LockFile::new();
  lock.insert(ROOT_NODE.to_string(), LockNode::root(node_inputs("")));
  for (path, input) in fetched {
    lock.insert(
      path.clone(),
      LockNode::input(input.type_, &input.url, &input.rev, Some(input.last_modified), node_inputs(path)),
    );
  }
  lock
}

/// Compare the pins of two lock files.
pub fn diff_locks(old: Option<&LockFile>, new: &LockFile) -> Vec<LockChange> {
  let rev_of = |node: &LockNode| node.rev.clone().unwrap_or_default();
  let mut changes = Vec::new();

  for (path, node) in &new.nodes {
    if node.is_root() {
      continue;
    }
    match old.and_then(|o| o.get(path)) {
      None => changes.push(LockChange::Added {
        path: path.clone(),
        rev: rev_of(node),
      }),
      Some(prev) if prev.rev != node.rev => changes.push(LockChange::Updated {
        path: path.clone(),
        old_rev: rev_of(prev),
        new_rev: rev_of(node),
      }),
      Some(_) => {}
    }
  }

  if let Some(old) = old {
    for (path, node) in &old.nodes {
      if !node.is_root() && !new.nodes.contains_key(path) {
        changes.push(LockChange::Removed { path: path.clone() });
      }
    }
  }

  changes
}

/// Save the lock file if it changed.
pub fn save_lock_file_if_changed(result: &ResolutionResult, base_dir: &Path) -> Result<bool, ResolveError> {
  if !result.lock_changed {
    return Ok(false);
  }
  let lock_path = base_dir.join(LOCK_FILENAME);
  info!(path = %lock_path.display(), "writing lock file");
  result.lock_file.save(&lock_path).map_err(ResolveError::SaveLock)?;
  Ok(true)
}

fn now() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_secs())
    .unwrap_or(0)
}
