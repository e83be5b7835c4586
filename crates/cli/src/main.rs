use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use graft_lib::consts::LOG_ENV;

mod cmd;
mod output;

use cmd::{AddArgs, cmd_add, cmd_info};
use output::{OutputFormat, print_error};

/// graft - add server-side rendering to an Angular workspace
#[derive(Parser)]
#[command(name = "graft")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Add the SSR server to a project
  Add(AddArgs),

  /// Show version, built-in delegates and project detection
  Info {
    /// Project directory
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

/// Log filter from `GRAFT_LOG`, then `RUST_LOG`, then the verbosity flag.
fn env_filter(verbose: bool) -> EnvFilter {
  if let Ok(directives) = std::env::var(LOG_ENV)
    && let Ok(filter) = EnvFilter::try_new(directives)
  {
    return filter;
  }
  if let Ok(filter) = EnvFilter::try_from_default_env() {
    return filter;
  }
  EnvFilter::new(if verbose { "graft=debug,graft_lib=debug" } else { "warn" })
}

fn run(cli: Cli) -> Result<()> {
  match cli.command {
    Commands::Add(args) => cmd_add(args, cli.verbose),
    Commands::Info { dir, output } => cmd_info(&dir, output),
  }
}

fn main() {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(env_filter(cli.verbose))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  if let Err(e) = run(cli) {
    print_error(&format!("{:#}", e));
    std::process::exit(1);
  }
}
