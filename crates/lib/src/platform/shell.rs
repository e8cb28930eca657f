//! Shell detection and activation script syntax.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

/// Shells a development environment can be activated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
  Bash,
  Zsh,
  Fish,
  Sh,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported shell '{0}', expected one of: bash, zsh, fish, sh")]
pub struct UnknownShell(pub String);

impl Shell {
  /// Detect the current shell from `$SHELL`, falling back to POSIX sh.
  pub fn detect() -> Self {
    let Ok(shell) = env::var("SHELL") else {
      return Shell::Sh;
    };

    let shell_name = PathBuf::from(&shell)
      .file_name()
      .and_then(|n| n.to_str())
      .unwrap_or("")
      .to_lowercase();

    if shell_name.contains("zsh") {
      Shell::Zsh
    } else if shell_name.contains("bash") {
      Shell::Bash
    } else if shell_name.contains("fish") {
      Shell::Fish
    } else {
      Shell::Sh
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Shell::Bash => "bash",
      Shell::Zsh => "zsh",
      Shell::Fish => "fish",
      Shell::Sh => "sh",
    }
  }

  /// Generate an export statement for setting an environment variable
  pub fn export_var(&self, name: &str, value: &str) -> String {
    match self {
      Shell::Fish => format!("set -gx {} {:?}", name, value),
      Shell::Bash | Shell::Zsh | Shell::Sh => format!("export {}={:?}", name, value),
    }
  }

  /// Generate an alias definition.
  ///
  /// The command is single-quoted so substitutions run when the alias is used.
  pub fn alias(&self, name: &str, command: &str) -> String {
    let quoted = command.replace('\'', r"'\''");
    match self {
      Shell::Fish => format!("alias {} '{}'", name, command.replace('\'', r"\'")),
      Shell::Bash | Shell::Zsh | Shell::Sh => format!("alias {}='{}'", name, quoted),
    }
  }

  pub fn comment(&self, text: &str) -> String {
    format!("# {}", text)
  }
}

impl fmt::Display for Shell {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Shell {
  type Err = UnknownShell;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "bash" => Ok(Shell::Bash),
      "zsh" => Ok(Shell::Zsh),
      "fish" => Ok(Shell::Fish),
      "sh" => Ok(Shell::Sh),
      _ => Err(UnknownShell(s.to_string())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  fn bash_export() {
    let export = Shell::Bash.export_var("LAKEFLAKE_SHELL", "default");
    assert_eq!(export, r#"export LAKEFLAKE_SHELL="default""#);
  }

  #[test]
  fn fish_export() {
    let export = Shell::Fish.export_var("LAKEFLAKE_SHELL", "default");
    assert_eq!(export, r#"set -gx LAKEFLAKE_SHELL "default""#);
  }

  #[test]
  fn posix_alias_escapes_single_quotes() {
    assert_eq!(Shell::Zsh.alias("hi", "echo 'x'"), r#"alias hi='echo '\''x'\'''"#);
    assert_eq!(Shell::Sh.alias("docs", "open \"$HOME\""), r#"alias docs='open "$HOME"'"#);
  }

  #[test]
  fn fish_alias() {
    assert_eq!(Shell::Fish.alias("docs", "open index.html"), "alias docs 'open index.html'");
  }

  #[test]
  fn parse_is_case_insensitive() {
    assert_eq!("Bash".parse::<Shell>().unwrap(), Shell::Bash);
    assert!(matches!("pwsh".parse::<Shell>(), Err(UnknownShell(s)) if s == "pwsh"));
  }

  #[test]
  #[serial]
  fn detect_reads_shell_env() {
    temp_env::with_var("SHELL", Some("/usr/local/bin/fish"), || {
      assert_eq!(Shell::detect(), Shell::Fish);
    });
    temp_env::with_var("SHELL", None::<&str>, || {
      assert_eq!(Shell::detect(), Shell::Sh);
    });
  }
}
