mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use output::{OutputFormat, print_error};

/// lakeflake - evaluate and build lakecli descriptors
#[derive(Parser)]
#[command(name = "lakeflake")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Descriptor file (default: ./lakeflake.toml, else the built-in lakecli descriptor)
  #[arg(short, long, global = true)]
  file: Option<PathBuf>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Write the lakecli descriptor to a project directory
  Init {
    /// Project directory
    #[arg(default_value = ".")]
    path: PathBuf,
  },

  /// Show the outputs of every supported platform
  Show {
    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
  },

  /// Resolve inputs and write the lock file
  Lock,

  /// Re-resolve inputs, ignoring locked revisions
  Update {
    /// Root inputs to update (default: all)
    inputs: Vec<String>,

    /// Show what would change without writing the lock file
    #[arg(long)]
    dry_run: bool,
  },

  /// Realize a package on this machine
  Build {
    /// Package name
    #[arg(default_value = "default")]
    name: String,

    /// Target platform (default: host)
    #[arg(long)]
    system: Option<String>,

    /// Abort the toolchain after this long (e.g., "10m", "1h")
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
  },

  /// Print the activation script of a dev shell
  Develop {
    /// Dev shell name
    #[arg(default_value = "default")]
    name: String,

    /// Shell syntax (auto-detected from $SHELL if not specified)
    #[arg(long)]
    shell: Option<String>,

    /// Target platform (default: host)
    #[arg(long)]
    system: Option<String>,
  },

  /// Show host platform and directories
  Info {
    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let file = cli.file.as_deref();

  let result = match cli.command {
    Commands::Init { path } => cmd::cmd_init(&path),
    Commands::Show { format } => cmd::cmd_show(file, format),
    Commands::Lock => cmd::cmd_lock(file),
    Commands::Update { inputs, dry_run } => cmd::cmd_update(file, inputs, dry_run),
    Commands::Build {
      name,
      system,
      timeout,
      format,
    } => cmd::cmd_build(file, &name, system.as_deref(), timeout, format),
    Commands::Develop { name, shell, system } => cmd::cmd_develop(file, &name, shell.as_deref(), system.as_deref()),
    Commands::Info { format } => cmd::cmd_info(format),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}
