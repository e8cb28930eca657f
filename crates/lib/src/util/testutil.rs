//! Test utilities for lakeflake-lib.
//!
//! [`GitRemote`] is a local repository served over `file://`, used as the
//! upstream of git inputs without network access.

use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run `git` in `dir` with a fixed identity and return its trimmed stdout.
pub fn git(dir: &Path, args: &[&str]) -> String {
  let output = Command::new("git")
    .args(["-c", "user.name=lakeflake-test", "-c", "user.email=test@localhost"])
    .args(["-c", "commit.gpgsign=false", "-c", "init.defaultBranch=main"])
    .args(args)
    .current_dir(dir)
    .output()
    .unwrap();
  assert!(
    output.status.success(),
    "git {:?} failed: {}",
    args,
    String::from_utf8_lossy(&output.stderr)
  );
  String::from_utf8(output.stdout).unwrap().trim().to_string()
}

/// An upstream git repository on the local filesystem with a `main` branch.
pub struct GitRemote {
  dir: TempDir,
}

impl GitRemote {
  /// Initialize the repository with one commit.
  pub fn new() -> Self {
    let remote = Self {
      dir: TempDir::new().unwrap(),
    };
    git(remote.path(), &["init", "--quiet"]);
    remote.commit("initial");
    git(remote.path(), &["branch", "-M", "main"]);
    remote
  }

  pub fn path(&self) -> &Path {
    self.dir.path()
  }

  /// The repository location as understood by gix.
  pub fn url(&self) -> String {
    format!("file://{}", self.path().display())
  }

  /// Write `file` and commit it, returning the new commit id.
  pub fn commit_file(&self, file: &str, content: &str) -> String {
    fs::write(self.path().join(file), content).unwrap();
    git(self.path(), &["add", "--all"]);
    git(self.path(), &["commit", "--quiet", "-m", file]);
    self.head()
  }

  /// Commit a change to a marker file, returning the new commit id.
  pub fn commit(&self, marker: &str) -> String {
    self.commit_file("marker", marker)
  }

  pub fn head(&self) -> String {
    git(self.path(), &["rev-parse", "HEAD"])
  }
}
