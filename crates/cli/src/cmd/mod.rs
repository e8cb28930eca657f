mod build;
mod develop;
mod info;
mod init;
mod lock;
mod show;
mod update;

pub use build::cmd_build;
pub use develop::cmd_develop;
pub use info::cmd_info;
pub use init::cmd_init;
pub use lock::cmd_lock;
pub use show::cmd_show;
pub use update::cmd_update;

use std::path::Path;

use anyhow::{Context, Result, anyhow};

use lakeflake_lib::descriptor::Descriptor;
use lakeflake_lib::platform::Platform;

/// Load the descriptor named by `--file`, or discover one in the working directory.
fn load_descriptor(file: Option<&Path>) -> Result<Descriptor> {
  let cwd = std::env::current_dir().context("Failed to read current directory")?;
  Descriptor::discover(file, &cwd).context("Failed to load descriptor")
}

/// The platform named by `--system`, or the host platform.
fn target_platform(system: Option<&str>) -> Result<Platform> {
  match system {
    Some(triple) => triple.parse::<Platform>().with_context(|| format!("Invalid --system '{}'", triple)),
    None => Platform::current().ok_or_else(|| anyhow!("Unsupported host platform")),
  }
}
