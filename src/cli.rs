//! CLI argument parsing for the documentation workflow.
//!
//! The CLI only wires arguments to workflow steps; discovery, validation and
//! generation policy live in their own modules.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "dforge",
    version,
    about = "Generate repository documentation from an outline and discovered sources",
    after_help = "Commands:\n  generate --template <T>   Discover, validate, and generate the document\n  check --template <T>      Resolve, discover, and validate without generating\n  discover --template <T>   Show (or write) discovered sources per section\n  eval --template <T>       Score discovery against labelled ground truth\n\nExamples:\n  dforge check --template docs/outline.json --root .\n  dforge generate --template docs/outline.json --out docs/GUIDE.md --sources-map docs/sources.json\n  dforge discover --template docs/outline.json --section \"Installation\" --json\n  dforge eval --template docs/outline.json --ground-truth docs/truth.json --min-f1 0.6",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Generate(GenerateArgs),
    Check(CheckArgs),
    Discover(DiscoverArgs),
    Eval(EvalArgs),
}

impl Command {
    pub fn verbose(&self) -> bool {
        match self {
            Command::Generate(args) => args.common.verbose,
            Command::Check(args) => args.common.verbose,
            Command::Discover(args) => args.common.verbose,
            Command::Eval(args) => args.common.verbose,
        }
    }
}

/// Inputs shared by every command.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Template JSON describing the document outline
    #[arg(long, value_name = "FILE")]
    pub template: PathBuf,

    /// Project root that source patterns are resolved against
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Config JSON (defaults to <root>/dforge.json, then the user config dir)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// LM command line (prompt on stdin, response on stdout)
    #[arg(long, value_name = "CMD")]
    pub lm: Option<String>,

    /// Append one JSON line per backend call to this file
    #[arg(long, value_name = "FILE")]
    pub lm_log: Option<PathBuf>,

    /// Do not discover sources for sections that declare none
    #[arg(long)]
    pub no_discover: bool,

    /// Rank discovered candidates without backend relevance scoring
    #[arg(long)]
    pub no_llm_scoring: bool,

    /// Walk directories that are excluded by default (target, node_modules, ...)
    #[arg(long)]
    pub include_excluded: bool,

    /// Emit progress lines and info-level logs
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Discover sources, validate, and generate the document")]
pub struct GenerateArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Output markdown file (defaults to the template's `output`, else stdout)
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Write the per-section sources map JSON here
    #[arg(long, value_name = "FILE")]
    pub sources_map: Option<PathBuf>,

    /// Stop after this many sections and keep a partial document
    #[arg(long, value_name = "N")]
    pub max_sections: Option<usize>,
}

#[derive(Parser, Debug)]
#[command(about = "Resolve, discover, and validate sources without generating")]
pub struct CheckArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Show discovered sources for sections without declared sources")]
pub struct DiscoverArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Only discover for this heading (or `Parent > Child` heading path)
    #[arg(long, value_name = "HEADING")]
    pub section: Option<String>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,

    /// Write a copy of the template with discovered sources filled in
    #[arg(long, value_name = "FILE")]
    pub write: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Measure discovery precision and recall against ground truth")]
pub struct EvalArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Ground truth JSON: {"sections": {"<heading>": ["path", ...]}}
    #[arg(long, value_name = "FILE")]
    pub ground_truth: PathBuf,

    /// Fail when the overall F1 falls below this value
    #[arg(long, value_name = "X")]
    pub min_f1: Option<f64>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}
