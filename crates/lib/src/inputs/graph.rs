//! Dependency graph building and follows resolution.
//!
//! Every input reachable from the descriptor is a node keyed by its slash path
//! (`pkgs`, `helper`, `helper/pkgs`). A node either resolves from its own URL
//! or follows another path. Resolution happens in three steps:
//!
//! 1. Nodes are discovered breadth-first as inputs are fetched
//! 2. [`DependencyGraph::resolve_follows`] maps every follows node to the
//!    source node it ultimately reuses, following chains up to
//!    [`MAX_FOLLOWS_DEPTH`] hops
//! 3. [`DependencyGraph::build_order`] orders source nodes so dependencies come
//!    before dependents

use std::collections::{BTreeMap, BTreeSet, HashSet};

use thiserror::Error;
use tracing::{debug, trace};

use super::types::MAX_FOLLOWS_DEPTH;

/// How a node gets its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
  /// Resolved independently from a URL.
  Source { url: String },
  /// Reuses the value of another path.
  Follows { target: String },
}

/// A node in the dependency graph.
#[derive(Debug, Clone)]
pub struct GraphNode {
  /// The input name (as declared in the parent's inputs table).
  pub name: String,

  /// Parent node path. Empty string for root-level inputs.
  pub parent_path: String,

  /// The full path to this node (e.g., "pkgs" or "helper/pkgs").
  pub full_path: String,

  pub kind: NodeKind,
}

impl GraphNode {
  fn new(name: &str, parent_path: &str, kind: NodeKind) -> Self {
    Self {
      name: name.to_string(),
      parent_path: parent_path.to_string(),
      full_path: join_path(parent_path, name),
      kind,
    }
  }

  /// Check if this is a root-level input (declared directly in the descriptor).
  pub fn is_root_level(&self) -> bool {
    self.parent_path.is_empty()
  }

  pub fn is_follows(&self) -> bool {
    matches!(self.kind, NodeKind::Follows { .. })
  }
}

/// The dependency graph structure.
#[derive(Debug, Default)]
pub struct DependencyGraph {
  /// All nodes in the graph, keyed by their full path.
  pub nodes: BTreeMap<String, GraphNode>,

  /// Edges: parent path -> child paths. The root is the empty path.
  pub edges: BTreeMap<String, BTreeSet<String>>,

  /// Follows mappings after resolution: follows path -> source path.
  pub follows_resolved: BTreeMap<String, String>,
}

/// Errors that can occur during graph operations.
#[derive(Debug, Error)]
pub enum GraphError {
  #[error("follows target '{target}' not found (referenced from '{from}')")]
  FollowsTargetNotFound { from: String, target: String },

  #[error("circular follows detected: {chain}")]
  CircularFollows { chain: String },

  #[error("follows chain too deep (maximum {max} hops): {chain}")]
  FollowsChainTooDeep { max: usize, chain: String },

  #[error("invalid follows path '{path}': {reason}")]
  InvalidFollowsPath { path: String, reason: String },

  #[error("input '{path}' depends on itself: {chain}")]
  Cycle { path: String, chain: String },
}

pub fn join_path(parent: &str, name: &str) -> String {
  if parent.is_empty() {
    name.to_string()
  } else {
    format!("{}/{}", parent, name)
  }
}

impl DependencyGraph {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add an input node under `parent_path` ("" for the root) and return its full path.
  pub fn add(&mut self, name: &str, parent_path: &str, kind: NodeKind) -> String {
    let node = GraphNode::new(name, parent_path, kind);
    let full_path = node.full_path.clone();
    self
      .edges
      .entry(parent_path.to_string())
      .or_default()
      .insert(full_path.clone());
    self.nodes.insert(full_path.clone(), node);
    full_path
  }

  pub fn get(&self, path: &str) -> Option<&GraphNode> {
    self.nodes.get(path)
  }

  /// Child paths of a node.
  pub fn children(&self, path: &str) -> Vec<&str> {
    self
      .edges
      .get(path)
      .map(|deps| deps.iter().map(|s| s.as_str()).collect())
      .unwrap_or_default()
  }

  /// The source node a path ultimately resolves to.
  ///
  /// Only meaningful after [`resolve_follows`](Self::resolve_follows).
  pub fn source_of<'a>(&'a self, path: &'a str) -> &'a str {
    self.follows_resolved.get(path).map(|s| s.as_str()).unwrap_or(path)
  }

  /// Resolve all follows nodes to their final source nodes.
  pub fn resolve_follows(&mut self) -> Result<(), GraphError> {
    let pending: Vec<(String, String)> = self
      .nodes
      .values()
      .filter_map(|n| match &n.kind {
        NodeKind::Follows { target } => Some((n.full_path.clone(), target.clone())),
        NodeKind::Source { .. } => None,
      })
      .collect();

    for (source_path, target) in pending {
      let resolved = self.resolve_follows_chain(&source_path, &target)?;
      debug!(source = %source_path, target = %resolved, "resolved follows");
      self.follows_resolved.insert(source_path, resolved);
    }

    Ok(())
  }

  /// Resolve a follows chain to its final source node.
  fn resolve_follows_chain(&self, source: &str, initial_target: &str) -> Result<String, GraphError> {
    let mut visited = HashSet::new();
    visited.insert(source.to_string());
    let mut chain = vec![source.to_string()];
    let mut current = normalize_follows_path(initial_target)?;

    for depth in 0..MAX_FOLLOWS_DEPTH {
      chain.push(current.clone());
      if !visited.insert(current.clone()) {
        return Err(GraphError::CircularFollows {
          chain: chain.join(" -> "),
        });
      }

      let next = match self.nodes.get(&current) {
        Some(GraphNode {
          kind: NodeKind::Source { .. },
          ..
        }) => return Ok(current),
        Some(GraphNode {
          kind: NodeKind::Follows { target },
          ..
        }) => normalize_follows_path(target)?,
        None => self
          .rewrite_through_follows(&current)
          .ok_or_else(|| GraphError::FollowsTargetNotFound {
            from: source.to_string(),
            target: current.clone(),
          })?,
      };

      trace!(depth, current = %current, next = %next, "following chain");
      current = next;
    }

    Err(GraphError::FollowsChainTooDeep {
      max: MAX_FOLLOWS_DEPTH,
      chain: chain.join(" -> "),
    })
  }

  /// Rewrite `a/b/c` when a prefix such as `a/b` is itself a follows node,
  /// since the children of a follows node live under its target.
  fn rewrite_through_follows(&self, path: &str) -> Option<String> {
    let segments: Vec<&str> = path.split('/').collect();
    (1..segments.len()).rev().find_map(|i| {
      let prefix = segments[..i].join("/");
      match &self.nodes.get(&prefix)?.kind {
        NodeKind::Follows { target } => Some(format!("{}/{}", target, segments[i..].join("/"))),
        NodeKind::Source { .. } => None,
      }
    })
  }

  /// Order source nodes so every node comes after the sources its children resolve to.
  pub fn build_order(&self) -> Result<Vec<String>, GraphError> {
    let mut order = Vec::new();
    let mut done = HashSet::new();
    let mut stack = Vec::new();

    for (path, node) in &self.nodes {
      if !node.is_follows() {
        self.visit(path, &mut done, &mut stack, &mut order)?;
      }
    }

    Ok(order)
  }

  fn visit(
    &self,
    path: &str,
    done: &mut HashSet<String>,
    stack: &mut Vec<String>,
    order: &mut Vec<String>,
  ) -> Result<(), GraphError> {
    if done.contains(path) {
      return Ok(());
    }
    if stack.iter().any(|p| p == path) {
      stack.push(path.to_string());
      return Err(GraphError::Cycle {
        path: path.to_string(),
        chain: stack.join(" -> "),
      });
    }

    stack.push(path.to_string());
    for child in self.children(path) {
      self.visit(self.source_of(child), done, stack, order)?;
    }
    stack.pop();

    done.insert(path.to_string());
    order.push(path.to_string());
    Ok(())
  }
}

fn normalize_follows_path(path: &str) -> Result<String, GraphError> {
  let trimmed = path.trim_matches('/');
  if trimmed.is_empty() {
    return Err(GraphError::InvalidFollowsPath {
      path: path.to_string(),
      reason: "path cannot be empty".to_string(),
    });
  }
  if trimmed.split('/').any(|s| s.is_empty()) {
    return Err(GraphError::InvalidFollowsPath {
      path: path.to_string(),
      reason: "path contains an empty segment".to_string(),
    });
  }
  Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn source(url: &str) -> NodeKind {
    NodeKind::Source { url: url.to_string() }
  }

  fn follows(target: &str) -> NodeKind {
    NodeKind::Follows {
      target: target.to_string(),
    }
  }

  /// pkgs, utils, helper, with helper/pkgs following pkgs.
  fn descriptor_graph() -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    graph.add("pkgs", "", source("path:./pkgs"));
    graph.add("utils", "", source("path:./utils"));
    graph.add("helper", "", source("path:./helper"));
    graph.add("pkgs", "helper", follows("pkgs"));
    graph
  }

  #[test]
  fn paths_and_roots() {
    let graph = descriptor_graph();

    assert!(graph.get("helper/pkgs").unwrap().is_follows());
    assert!(!graph.get("helper/pkgs").unwrap().is_root_level());
    assert!(graph.get("pkgs").unwrap().is_root_level());
    assert_eq!(graph.children("helper"), vec!["helper/pkgs"]);
  }

  #[test]
  fn follows_resolves_to_root_input() {
    let mut graph = descriptor_graph();
    graph.resolve_follows().unwrap();

    assert_eq!(graph.source_of("helper/pkgs"), "pkgs");
    assert_eq!(graph.source_of("utils"), "utils");
  }

  #[test]
  fn build_order_puts_followed_input_first() {
    let mut graph = descriptor_graph();
    graph.resolve_follows().unwrap();
    let order = graph.build_order().unwrap();

    let pos = |p: &str| order.iter().position(|o| o == p).unwrap();
    assert_eq!(order.len(), 3);
    assert!(pos("pkgs") < pos("helper"));
    assert!(!order.contains(&"helper/pkgs".to_string()));
  }

  #[test]
  fn follows_chain() {
    let mut graph = DependencyGraph::new();
    graph.add("pkgs", "", source("path:./pkgs"));
    graph.add("a", "", source("path:./a"));
    graph.add("b", "", source("path:./b"));
    graph.add("pkgs", "a", follows("b/pkgs"));
    graph.add("pkgs", "b", follows("pkgs"));
    graph.resolve_follows().unwrap();

    assert_eq!(graph.source_of("a/pkgs"), "pkgs");
    assert_eq!(graph.source_of("b/pkgs"), "pkgs");
  }

  #[test]
  fn follows_through_a_followed_prefix() {
    let mut graph = DependencyGraph::new();
    graph.add("helper", "", source("path:./helper"));
    graph.add("fenix", "helper", source("path:./fenix"));
    graph.add("other", "", source("path:./other"));
    graph.add("helper", "other", follows("helper"));
    graph.add("fenix", "", follows("other/helper/fenix"));
    graph.resolve_follows().unwrap();

    assert_eq!(graph.source_of("fenix"), "helper/fenix");
  }

  #[test]
  fn missing_target_is_an_error() {
    let mut graph = DependencyGraph::new();
    graph.add("helper", "", source("path:./helper"));
    graph.add("pkgs", "helper", follows("nixpkgs"));

    assert!(matches!(
      graph.resolve_follows(),
      Err(GraphError::FollowsTargetNotFound { ref target, .. }) if target == "nixpkgs"
    ));
  }

  #[test]
  fn circular_follows_is_an_error() {
    let mut graph = DependencyGraph::new();
    graph.add("a", "", source("path:./a"));
    graph.add("b", "", source("path:./b"));
    graph.add("x", "a", follows("b/x"));
    graph.add("x", "b", follows("a/x"));

    assert!(matches!(graph.resolve_follows(), Err(GraphError::CircularFollows { .. })));
  }

  #[test]
  fn empty_follows_path_is_invalid() {
    let mut graph = DependencyGraph::new();
    graph.add("a", "", source("path:./a"));
    graph.add("x", "a", follows("/"));

    assert!(matches!(graph.resolve_follows(), Err(GraphError::InvalidFollowsPath { .. })));
  }

  #[test]
  fn following_an_ancestor_is_a_cycle() {
    let mut graph = DependencyGraph::new();
    graph.add("helper", "", source("path:./helper"));
    graph.add("self", "helper", follows("helper"));
    graph.resolve_follows().unwrap();

    assert!(matches!(graph.build_order(), Err(GraphError::Cycle { .. })));
  }
}
