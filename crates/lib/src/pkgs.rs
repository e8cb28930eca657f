//! Resolved package sets.
//!
//! A [`PackageSet`] is the package collection input viewed for one platform.
//! It is created fresh for every platform being evaluated and never mutated.
//! Looking up an attribute path (`darwin.apple_sdk.frameworks.Security`) yields
//! a [`PackageRef`] whose identity is derived from the collection's revision,
//! the platform and the attribute path, so the same lookup against the same pin
//! always names the same package.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::inputs::{InputPin, ResolvedInput};
use crate::platform::Platform;
use crate::util::hash::{HashError, Hashable, ObjectHash};

#[derive(Debug, Error)]
pub enum PackageError {
  #[error("invalid attribute path '{attr}': {reason}")]
  InvalidAttrPath { attr: String, reason: &'static str },

  #[error("failed to hash package '{attr}': {source}")]
  Hash {
    attr: String,
    #[source]
    source: HashError,
  },
}

/// The package collection for one platform.
#[derive(Debug, Clone)]
pub struct PackageSet {
  source: Arc<ResolvedInput>,
  platform: Platform,
}

/// A package looked up in a [`PackageSet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageRef {
  /// Attribute path inside the collection.
  pub attr: String,
  pub id: ObjectHash,
}

#[derive(Serialize)]
struct PackageIdentity<'a> {
  rev: &'a str,
  platform: Platform,
  attr: &'a str,
}

impl Hashable for PackageIdentity<'_> {}

impl PackageSet {
  pub fn new(source: Arc<ResolvedInput>, platform: Platform) -> Self {
    Self { source, platform }
  }

  pub fn platform(&self) -> Platform {
    self.platform
  }

  /// The resolved collection input backing this set.
  pub fn source(&self) -> &Arc<ResolvedInput> {
    &self.source
  }

  pub fn pin(&self) -> InputPin {
    self.source.pin()
  }

  /// Look up a package by attribute path.
  pub fn get(&self, attr: &str) -> Result<PackageRef, PackageError> {
    validate_attr(attr)?;
    let id = PackageIdentity {
      rev: &self.source.rev,
      platform: self.platform,
      attr,
    }
    .compute_hash()
    .map_err(|source| PackageError::Hash {
      attr: attr.to_string(),
      source,
    })?;

    Ok(PackageRef {
      attr: attr.to_string(),
      id,
    })
  }

  /// Look up several packages, keeping their order.
  pub fn get_all<S: AsRef<str>>(&self, attrs: &[S]) -> Result<Vec<PackageRef>, PackageError> {
    attrs.iter().map(|a| self.get(a.as_ref())).collect()
  }
}

fn validate_attr(attr: &str) -> Result<(), PackageError> {
  let invalid = |reason| {
    Err(PackageError::InvalidAttrPath {
      attr: attr.to_string(),
      reason,
    })
  };

  if attr.is_empty() {
    return invalid("path cannot be empty");
  }
  if attr.split('.').any(str::is_empty) {
    return invalid("path contains an empty segment");
  }
  if !attr
    .chars()
    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+'))
  {
    return invalid("only ASCII letters, digits, '.', '-', '_' and '+' are allowed");
  }
  Ok(())
}
