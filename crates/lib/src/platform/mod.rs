pub mod arch;
pub mod os;
pub mod paths;
pub mod shell;
pub mod systems;

use std::fmt;
use std::str::FromStr;

use arch::Arch;
use os::Os;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors produced when parsing a platform triple.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParsePlatformError {
  #[error("invalid platform '{0}', expected '<arch>-<os>' (e.g. 'x86_64-linux')")]
  Malformed(String),

  #[error("unknown architecture '{0}'")]
  UnknownArch(String),

  #[error("unknown operating system '{0}'")]
  UnknownOs(String),
}

/// Platform identifier combining architecture and OS (e.g., "aarch64-darwin")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

impl Platform {
  /// Create a new platform identifier
  pub fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::current()?,
      os: Os::current()?,
    })
  }

  /// Returns the platform triple string (e.g., "aarch64-darwin")
  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }

  pub fn is_darwin(&self) -> bool {
    self.os.is_darwin()
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}

impl FromStr for Platform {
  type Err = ParsePlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (arch, os) = s
      .split_once('-')
      .ok_or_else(|| ParsePlatformError::Malformed(s.to_string()))?;
    if arch.is_empty() || os.is_empty() || os.contains('-') {
      return Err(ParsePlatformError::Malformed(s.to_string()));
    }
    Ok(Self::new(arch.parse()?, os.parse()?))
  }
}

// Serialized as the triple so platforms can key JSON maps.
impl Serialize for Platform {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.triple())
  }
}

impl<'de> Deserialize<'de> for Platform {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
  }
}

/// Returns the platform triple for the current system (e.g., "aarch64-darwin")
///
/// Returns `None` if the current platform is not supported
pub fn platform_triple() -> Option<String> {
  Platform::current().map(|p| p.triple())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn platform_triple_format() {
    // Verifies the triple format is "arch-os"
    let platform = Platform::new(Arch::Aarch64, Os::Darwin);
    assert_eq!(platform.triple(), "aarch64-darwin");

    let platform = Platform::new(Arch::X86_64, Os::Linux);
    assert_eq!(platform.triple(), "x86_64-linux");
  }

  #[test]
  fn parse_accepts_known_triples() {
    let platform: Platform = "aarch64-darwin".parse().unwrap();
    assert_eq!(platform, Platform::new(Arch::Aarch64, Os::Darwin));
    assert!(platform.is_darwin());

    let platform: Platform = "x86_64-linux".parse().unwrap();
    assert!(!platform.is_darwin());
  }

  #[test]
  fn parse_rejects_malformed_triples() {
    assert!(matches!("x86_64".parse::<Platform>(), Err(ParsePlatformError::Malformed(_))));
    assert!(matches!("-linux".parse::<Platform>(), Err(ParsePlatformError::Malformed(_))));
    assert!(matches!(
      "x86_64-unknown-linux".parse::<Platform>(),
      Err(ParsePlatformError::Malformed(_))
    ));
    assert!(matches!("sparc-linux".parse::<Platform>(), Err(ParsePlatformError::UnknownArch(_))));
  }

  #[test]
  fn serializes_as_triple() {
    let platform = Platform::new(Arch::X86_64, Os::Darwin);
    assert_eq!(serde_json::to_string(&platform).unwrap(), r#""x86_64-darwin""#);

    let parsed: Platform = serde_json::from_str(r#""aarch64-linux""#).unwrap();
    assert_eq!(parsed, Platform::new(Arch::Aarch64, Os::Linux));
  }
}
