mod backend;
mod cli;
mod config;
mod context;
mod discovery;
mod engine;
mod error;
mod output;
mod preflight;
mod prompts;
mod sources;
mod template;
mod util;
mod workflow;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::RootArgs::parse();
    init_logging(args.command.verbose());

    match args.command {
        cli::Command::Generate(args) => workflow::run_generate(&args),
        cli::Command::Check(args) => workflow::run_check(&args),
        cli::Command::Discover(args) => workflow::run_discover(&args),
        cli::Command::Eval(args) => workflow::run_eval(&args),
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the level implied by `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
