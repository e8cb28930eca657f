//! Built-in descriptor content.

/// Descriptor for the `lakecli` binary, used when a project carries no
/// `lakeflake.toml` and written out by `lakeflake init`.
pub const LAKECLI_DESCRIPTOR: &str = r#"description = "lakecli command-line binary"

[inputs]
pkgs = "git:https://github.com/NixOS/nixpkgs.git#nixpkgs-unstable"
utils = "git:https://github.com/numtide/flake-utils.git"

[inputs.helper]
url = "git:https://github.com/nix-community/naersk.git"
inputs.pkgs.follows = "pkgs"

[outputs]
package-set = "pkgs"
systems = "utils"
builder = "helper"

[package]
name = "lakecli"
src = "."
build-inputs = []

[package.os.darwin]
build-inputs = [
  "darwin.apple_sdk.frameworks.CoreFoundation",
  "darwin.apple_sdk.frameworks.CoreServices",
  "darwin.apple_sdk.frameworks.SystemConfiguration",
]

[dev-shell]
packages = ["rustc", "clippy", "rustfmt", "cargo"]

[dev-shell.os.linux.aliases]
rust-doc = 'xdg-open "$(rustc --print sysroot)/share/doc/rust/html/index.html"'

[dev-shell.os.darwin]
packages = ["darwin.apple_sdk.frameworks.Security", "libiconv"]

[dev-shell.os.darwin.aliases]
rust-doc = 'open "$(rustc --print sysroot)/share/doc/rust/html/index.html"'
"#;
