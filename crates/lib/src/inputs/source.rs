//! Input URL parsing.
//!
//! Two schemes are understood:
//!
//! - `git:<url>[#<rev>]`, e.g. `git:https://github.com/NixOS/nixpkgs.git#nixos-24.05`
//! - `path:<path>`, e.g. `path:../helper` or `path:~/src/systems`

use std::path::PathBuf;

use thiserror::Error;

/// A parsed input source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
  /// A git repository, optionally pinned to a revision (commit, tag or branch).
  Git { url: String, rev: Option<String> },
  /// A local directory.
  Path { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
  #[error("unknown input scheme in '{0}', expected 'git:' or 'path:'")]
  UnknownScheme(String),

  #[error("empty {scheme} location in '{url}'")]
  EmptyLocation { scheme: &'static str, url: String },

  #[error("empty revision after '#' in '{0}'")]
  EmptyRevision(String),
}

/// Parse an input URL.
pub fn parse(url: &str) -> Result<InputSource, ParseError> {
  if let Some(rest) = url.strip_prefix("git:") {
    let (location, rev) = match rest.split_once('#') {
      Some((_, "")) => return Err(ParseError::EmptyRevision(url.to_string())),
      Some((location, rev)) => (location, Some(rev.to_string())),
      None => (rest, None),
    };
    if location.is_empty() {
      return Err(ParseError::EmptyLocation {
        scheme: "git",
        url: url.to_string(),
      });
    }
    return Ok(InputSource::Git {
      url: location.to_string(),
      rev,
    });
  }

  if let Some(rest) = url.strip_prefix("path:") {
    if rest.is_empty() {
      return Err(ParseError::EmptyLocation {
        scheme: "path",
        url: url.to_string(),
      });
    }
    return Ok(InputSource::Path {
      path: PathBuf::from(rest),
    });
  }

  Err(ParseError::UnknownScheme(url.to_string()))
}

/// The lock-file type tag for a source.
pub fn source_type(source: &InputSource) -> &'static str {
  match source {
    InputSource::Git { .. } => "git",
    InputSource::Path { .. } => "path",
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn git_without_rev() {
    let source = parse("git:https://github.com/numtide/flake-utils.git").unwrap();
    assert_eq!(
      source,
      InputSource::Git {
        url: "https://github.com/numtide/flake-utils.git".to_string(),
        rev: None,
      }
    );
    assert_eq!(source_type(&source), "git");
  }

  #[test]
  fn git_with_rev() {
    let source = parse("git:https://github.com/NixOS/nixpkgs.git#nixos-24.05").unwrap();
    assert!(matches!(
      source,
      InputSource::Git { ref rev, .. } if rev.as_deref() == Some("nixos-24.05")
    ));
  }

  #[test]
  fn path_source() {
    let source = parse("path:../helper").unwrap();
    assert_eq!(
      source,
      InputSource::Path {
        path: PathBuf::from("../helper")
      }
    );
    assert_eq!(source_type(&source), "path");
  }

  #[test]
  fn malformed_urls_are_rejected() {
    assert!(matches!(parse("https://example.com"), Err(ParseError::UnknownScheme(_))));
    assert!(matches!(parse("git:"), Err(ParseError::EmptyLocation { scheme: "git", .. })));
    assert!(matches!(parse("git:https://x.git#"), Err(ParseError::EmptyRevision(_))));
    assert!(matches!(parse("path:"), Err(ParseError::EmptyLocation { scheme: "path", .. })));
  }
}
