/// Entry point for the remora CLI, a symbol recovery tool for obfuscated JVM bytecode.
///
/// This module parses command-line arguments, initializes logging and dispatches to the
/// `remap`, `fingerprint` and `callgraph` subcommands.
use clap::Parser;
use remora_cli::commands::{Cmd, Command};
use tracing_subscriber::EnvFilter;

/// Command-line interface for remora.
///
/// remora recovers symbol names across versions of an obfuscated artifact: it pairs the live
/// methods and fields of an old version with those of a new one and carries a human-named
/// mapping forward.
#[derive(Parser)]
#[command(name = "remora")]
#[command(about = "remora: cross-version symbol recovery for obfuscated JVM bytecode")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Log at DEBUG instead of INFO (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Runs the remora CLI with the provided arguments.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    cli.command.execute().await
}
