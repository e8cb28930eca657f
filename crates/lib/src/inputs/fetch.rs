//! Git fetch and path resolution for inputs.
//!
//! Git inputs are cached at `~/.cache/lakeflake/inputs/{name}-{urlhash}/` with
//! their `.git` directories intact. A locked commit that is already present
//! locally is used without contacting the remote; anything else is fetched.
//!
//! Files inside an input (its own descriptor, a systems list) are read at the
//! pinned revision, not from whatever the worktree happens to hold.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use gix::remote::Direction;
use thiserror::Error;
use tracing::{debug, info};

use super::types::ResolvedInput;
use crate::platform::paths::home_dir;
use crate::util::hash::hash_bytes;

/// Revision recorded for path inputs.
pub const LOCAL_REV: &str = "local";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur during fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("failed to create cache directory '{0}': {1}")]
  CreateCacheDir(PathBuf, #[source] io::Error),

  #[error("failed to clone repository '{url}': {source}")]
  Clone {
    url: String,
    #[source]
    source: BoxError,
  },

  #[error("failed to open repository at '{path}': {source}")]
  Open {
    path: PathBuf,
    #[source]
    source: Box<gix::open::Error>,
  },

  #[error("failed to fetch from '{url}': {source}")]
  Fetch {
    url: String,
    #[source]
    source: BoxError,
  },

  #[error("revision '{rev}' not found in repository")]
  RevisionNotFound { rev: String },

  #[error("failed to checkout revision '{rev}': {source}")]
  Checkout {
    rev: String,
    #[source]
    source: BoxError,
  },

  #[error("failed to resolve HEAD: {0}")]
  ResolveHead(String),

  #[error("no remote configured for repository")]
  NoRemote,

  #[error("failed to connect to remote '{url}': {source}")]
  Connect {
    url: String,
    #[source]
    source: BoxError,
  },

  #[error("path does not exist: {0}")]
  PathNotFound(PathBuf),

  #[error("failed to resolve path '{path}': {source}")]
  CanonicalizePath {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read '{file}' from input at '{path}': {source}")]
  ReadFile {
    path: PathBuf,
    file: String,
    #[source]
    source: BoxError,
  },
}

/// Cache directory name for a git input: the input name plus a short hash of
/// its URL, so differently-sourced inputs with the same name never share a clone.
pub fn cache_key(name: &str, url: &str) -> String {
  let safe: String = name
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
    .collect();
  format!("{}-{}", safe, &hash_bytes(url.as_bytes()).0[..12])
}

/// Fetch a git input into the cache and resolve the target revision.
///
/// If `rev` is `None`, HEAD of the remote's default branch is used. Branch and
/// tag names are resolved against the remote after fetching; only a full commit
/// id already present in the cache skips the network. Returns the checkout path
/// and the resolved commit hash.
pub fn fetch_git(key: &str, url: &str, rev: Option<&str>, cache_dir: &Path) -> Result<(PathBuf, String), FetchError> {
  let repo_path = cache_dir.join(key);

  if !cache_dir.exists() {
    fs::create_dir_all(cache_dir).map_err(|e| FetchError::CreateCacheDir(cache_dir.to_path_buf(), e))?;
  }

  let repo = if repo_path.join(".git").exists() {
    debug!(key, path = %repo_path.display(), "opening cached repository");
    let repo = open_cached(&repo_path)?;

    if let Some(commit) = rev.and_then(|r| cached_commit(&repo, r)) {
      debug!(key, rev = %commit, "commit present in cache");
      return Ok((repo_path, commit));
    }

    fetch_updates(&repo, url)?;
    repo
  } else {
    info!(key, url, path = %repo_path.display(), "cloning repository");
    clone_repo(url, &repo_path)?
  };

  let commit = resolve_revision(&repo, rev)?;
  debug!(key, rev = %commit, "resolved revision");
  Ok((repo_path, commit))
}

/// Identity recorded in reflog entries when a fetch moves the cache's refs, so
/// fetching works without a configured git identity.
const CACHE_IDENTITY: [&str; 2] = ["committer.name=lakeflake", "committer.email=lakeflake@localhost"];

fn open_cached(repo_path: &Path) -> Result<gix::Repository, FetchError> {
  gix::open_opts(repo_path, gix::open::Options::default().config_overrides(CACHE_IDENTITY)).map_err(|e| {
    FetchError::Open {
      path: repo_path.to_path_buf(),
      source: Box::new(e),
    }
  })
}

/// The commit named by `rev` if it is a full object id the cache already has.
fn cached_commit(repo: &gix::Repository, rev: &str) -> Option<String> {
  let id = gix::ObjectId::from_hex(rev.as_bytes()).ok()?;
  repo.has_object(id).then(|| id.to_string())
}

fn clone_repo(url: &str, dest: &Path) -> Result<gix::Repository, FetchError> {
  let clone_err = |e: BoxError| FetchError::Clone {
    url: url.to_string(),
    source: e,
  };

  let mut prepared = gix::prepare_clone(url, dest).map_err(|e| clone_err(Box::new(e)))?;

  let (mut checkout, _outcome) = prepared
    .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| clone_err(Box::new(e)))?;

  let (repo, _outcome) = checkout
    .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| FetchError::Checkout {
      rev: "HEAD".to_string(),
      source: Box::new(e),
    })?;

  Ok(repo)
}

fn fetch_updates(repo: &gix::Repository, url: &str) -> Result<(), FetchError> {
  debug!(url, "fetching updates");
  let connect_err = |e: BoxError| FetchError::Connect {
    url: url.to_string(),
    source: e,
  };
  let fetch_err = |e: BoxError| FetchError::Fetch {
    url: url.to_string(),
    source: e,
  };

  let remote = repo
    .find_default_remote(Direction::Fetch)
    .ok_or(FetchError::NoRemote)?
    .map_err(|e| connect_err(Box::new(e)))?;

  let connection = remote
    .connect(Direction::Fetch)
    .map_err(|e| connect_err(Box::new(e)))?;

  connection
    .prepare_fetch(gix::progress::Discard, Default::default())
    .map_err(|e| fetch_err(Box::new(e)))?
    .receive(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| fetch_err(Box::new(e)))?;

  Ok(())
}

/// Resolve a revision spec (commit, tag, branch) to a commit hash; `None` means
/// the remote's default branch.
///
/// Remote-tracking refs win over local ones: a clone's local branch is created
/// once and never moves when the cache is fetched again.
fn resolve_revision(repo: &gix::Repository, rev: Option<&str>) -> Result<String, FetchError> {
  let Some(rev_str) = rev else {
    return resolve_remote_head(repo);
  };

  let candidates = [format!("refs/remotes/origin/{}", rev_str), rev_str.to_string()];
  for candidate in &candidates {
    if let Some(commit) = peel_to_commit(repo, candidate)? {
      return Ok(commit);
    }
  }

  Err(FetchError::RevisionNotFound {
    rev: rev_str.to_string(),
  })
}

/// The commit at the tip of the remote's default branch.
///
/// That is the remote-tracking ref of the branch the clone checked out, then
/// `origin/HEAD`, then the local HEAD for caches without remote-tracking refs.
fn resolve_remote_head(repo: &gix::Repository) -> Result<String, FetchError> {
  let head_name = repo.head_name().map_err(|e| FetchError::ResolveHead(e.to_string()))?;
  if let Some(name) = head_name {
    let tracking = format!("refs/remotes/origin/{}", name.shorten());
    if let Some(commit) = peel_to_commit(repo, &tracking)? {
      return Ok(commit);
    }
  }
  if let Some(commit) = peel_to_commit(repo, "refs/remotes/origin/HEAD")? {
    return Ok(commit);
  }

  let mut head = repo.head().map_err(|e| FetchError::ResolveHead(e.to_string()))?;
  let commit = head
    .peel_to_commit()
    .map_err(|e| FetchError::ResolveHead(e.to_string()))?;
  Ok(commit.id.to_string())
}

/// Peel `spec` to a commit id, or `None` if it names nothing.
fn peel_to_commit(repo: &gix::Repository, spec: &str) -> Result<Option<String>, FetchError> {
  let Ok(parsed) = repo.rev_parse(spec) else {
    return Ok(None);
  };
  let Some(object_id) = parsed.single() else {
    return Err(FetchError::RevisionNotFound {
      rev: format!("{} (ambiguous)", spec),
    });
  };
  let not_found = |e: BoxError| FetchError::RevisionNotFound {
    rev: format!("{}: {}", spec, e),
  };
  let commit = object_id
    .object()
    .map_err(|e| not_found(Box::new(e)))?
    .peel_to_commit()
    .map_err(|e| not_found(Box::new(e)))?;
  Ok(Some(commit.id.to_string()))
}

/// Read a file from a git input at a pinned revision.
///
/// Returns `Ok(None)` if the revision's tree has no such file.
pub fn read_git_file(repo_path: &Path, rev: &str, file: &str) -> Result<Option<String>, FetchError> {
  let read_err = |e: BoxError| FetchError::ReadFile {
    path: repo_path.to_path_buf(),
    file: file.to_string(),
    source: e,
  };

  let repo = gix::open(repo_path).map_err(|e| FetchError::Open {
    path: repo_path.to_path_buf(),
    source: Box::new(e),
  })?;
  let spec = repo.rev_parse(rev).map_err(|e| read_err(Box::new(e)))?;
  let id = spec.single().ok_or_else(|| FetchError::RevisionNotFound { rev: rev.to_string() })?;
  let tree = id
    .object()
    .map_err(|e| read_err(Box::new(e)))?
    .peel_to_tree()
    .map_err(|e| read_err(Box::new(e)))?;

  let Some(entry) = tree.lookup_entry_by_path(file).map_err(|e| read_err(Box::new(e)))? else {
    return Ok(None);
  };
  let blob = entry.object().map_err(|e| read_err(Box::new(e)))?;
  let content = String::from_utf8(blob.data.clone()).map_err(|e| read_err(Box::new(e)))?;
  Ok(Some(content))
}

/// Read a file from a path input.
pub fn read_path_file(root: &Path, file: &str) -> Result<Option<String>, FetchError> {
  match fs::read_to_string(root.join(file)) {
    Ok(content) => Ok(Some(content)),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
    Err(e) => Err(FetchError::ReadFile {
      path: root.to_path_buf(),
      file: file.to_string(),
      source: Box::new(e),
    }),
  }
}

/// Read a file from a resolved input at its pinned revision.
pub fn read_input_file(input: &ResolvedInput, file: &str) -> Result<Option<String>, FetchError> {
  if input.rev == LOCAL_REV {
    read_path_file(&input.path, file)
  } else {
    read_git_file(&input.path, &input.rev, file)
  }
}

/// Resolve a path input.
///
/// Handles `~` expansion and relative paths (resolved against `base_dir`), and
/// verifies the path exists.
pub fn resolve_path(path_str: &str, base_dir: &Path) -> Result<PathBuf, FetchError> {
  let expanded = if let Some(rest) = path_str.strip_prefix("~/") {
    home_dir().join(rest)
  } else if path_str == "~" {
    home_dir()
  } else if Path::new(path_str).is_absolute() {
    PathBuf::from(path_str)
  } else {
    base_dir.join(path_str)
  };

  let canonical = dunce::canonicalize(&expanded).map_err(|e| {
    if e.kind() == io::ErrorKind::NotFound {
      FetchError::PathNotFound(expanded.clone())
    } else {
      FetchError::CanonicalizePath {
        path: expanded.clone(),
        source: e,
      }
    }
  })?;

  debug!(path = %canonical.display(), "resolved path input");
  Ok(canonical)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use tempfile::TempDir;

  mod resolve_path_tests {
    use super::*;

    #[test]
    #[serial]
    #[cfg(unix)]
    fn tilde_expansion() {
      let temp_dir = TempDir::new().unwrap();
      let home = temp_dir.path();
      let systems = home.join("systems");
      fs::create_dir(&systems).unwrap();

      temp_env::with_var("HOME", Some(home.to_str().unwrap()), || {
        let result = resolve_path("~/systems", Path::new("/unused")).unwrap();
        assert_eq!(result, dunce::canonicalize(&systems).unwrap());
      });
    }

    #[test]
    fn relative_path() {
      let temp_dir = TempDir::new().unwrap();
      let base = temp_dir.path();
      let helper = base.join("helper");
      fs::create_dir(&helper).unwrap();

      let result = resolve_path("./helper", base).unwrap();
      assert_eq!(result, dunce::canonicalize(&helper).unwrap());
    }

    #[test]
    fn nonexistent_path_returns_error() {
      let result = resolve_path("/nonexistent/path/12345", Path::new("/unused"));
      assert!(matches!(result, Err(FetchError::PathNotFound(_))));
    }
  }

  mod read_path_file_tests {
    use super::*;

    #[test]
    fn present_and_missing_files() {
      let temp_dir = TempDir::new().unwrap();
      fs::write(temp_dir.path().join("systems.json"), "[]").unwrap();

      assert_eq!(
        read_path_file(temp_dir.path(), "systems.json").unwrap().as_deref(),
        Some("[]")
      );
      assert!(read_path_file(temp_dir.path(), "lakeflake.toml").unwrap().is_none());
    }
  }

  #[test]
  fn cache_key_depends_on_url() {
    let a = cache_key("pkgs", "https://github.com/NixOS/nixpkgs.git");
    let b = cache_key("pkgs", "https://example.com/nixpkgs.git");

    assert!(a.starts_with("pkgs-"));
    assert_ne!(a, b);
    assert_eq!(cache_key("helper/pkgs", "x").split('-').next(), Some("helper_pkgs"));
  }

  mod fetch_git_tests {
    use super::*;
    use crate::util::testutil::GitRemote;

    fn fetch(remote: &GitRemote, rev: Option<&str>, cache: &Path) -> String {
      let url = remote.url();
      fetch_git(&cache_key("pkgs", &url), &url, rev, cache).unwrap().1
    }

    #[test]
    fn clone_resolves_default_branch_and_fragment() {
      let remote = GitRemote::new();
      let cache = TempDir::new().unwrap();

      assert_eq!(fetch(&remote, None, cache.path()), remote.head());
      assert_eq!(fetch(&remote, Some("main"), cache.path()), remote.head());
    }

    #[test]
    fn cached_branch_advances_after_upstream_commit() {
      let remote = GitRemote::new();
      let cache = TempDir::new().unwrap();
      let first = fetch(&remote, Some("main"), cache.path());

      let second = remote.commit("second");
      assert_ne!(first, second);
      assert_eq!(fetch(&remote, Some("main"), cache.path()), second);
    }

    #[test]
    fn cached_default_branch_advances_after_upstream_commit() {
      let remote = GitRemote::new();
      let cache = TempDir::new().unwrap();
      fetch(&remote, None, cache.path());

      let second = remote.commit("second");
      assert_eq!(fetch(&remote, None, cache.path()), second);
    }

    #[test]
    fn cached_commit_needs_no_remote() {
      let remote = GitRemote::new();
      let cache = TempDir::new().unwrap();
      let first = fetch(&remote, None, cache.path());
      remote.commit("second");
      fetch(&remote, None, cache.path());

      fs::remove_dir_all(remote.path().join(".git")).unwrap();
      assert_eq!(fetch(&remote, Some(&first), cache.path()), first);
    }

    #[test]
    fn unknown_branch_is_not_found() {
      let remote = GitRemote::new();
      let cache = TempDir::new().unwrap();
      let url = remote.url();

      let result = fetch_git(&cache_key("pkgs", &url), &url, Some("no-such-branch"), cache.path());
      assert!(matches!(result, Err(FetchError::RevisionNotFound { .. })));
    }

    #[test]
    #[serial]
    #[cfg(unix)]
    fn refetch_without_git_identity() {
      let remote = GitRemote::new();
      let cache = TempDir::new().unwrap();
      let home = TempDir::new().unwrap();
      let home_str = home.path().to_str().unwrap();

      temp_env::with_vars(
        [
          ("HOME", Some(home_str)),
          ("XDG_CONFIG_HOME", Some(home_str)),
          ("GIT_COMMITTER_NAME", None),
          ("GIT_COMMITTER_EMAIL", None),
          ("GIT_AUTHOR_NAME", None),
          ("GIT_AUTHOR_EMAIL", None),
          ("EMAIL", None),
        ],
        || {
          fetch(&remote, None, cache.path());
          let second = remote.commit("second");
          assert_eq!(fetch(&remote, None, cache.path()), second);
        },
      );
    }

    #[test]
    fn files_are_read_at_the_pinned_revision() {
      let remote = GitRemote::new();
      let cache = TempDir::new().unwrap();
      let old = remote.commit_file("systems.json", r#"["x86_64-linux"]"#);
      remote.commit_file("systems.json", r#"["aarch64-darwin"]"#);

      let url = remote.url();
      let (path, head) = fetch_git(&cache_key("pkgs", &url), &url, None, cache.path()).unwrap();

      assert_eq!(
        read_git_file(&path, &old, "systems.json").unwrap().as_deref(),
        Some(r#"["x86_64-linux"]"#)
      );
      assert_eq!(
        read_git_file(&path, &head, "systems.json").unwrap().as_deref(),
        Some(r#"["aarch64-darwin"]"#)
      );
      assert!(read_git_file(&path, &head, "lakeflake.toml").unwrap().is_none());
    }
  }
}
