//! CLI argument parsing for report generation and checksum-gated serving.
use crate::classify::Status;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "bddreport",
    version,
    about = "Aggregate behavioral-test JSON results into an HTML report and serve it behind checksums",
    after_help = "Examples:\n  bddreport generate --input target/cucumber --output target/report\n  bddreport generate --input results --output report --escalate skipped,undefined --fail-on-breach\n  bddreport fetch --state report.archive.json features/login.feature.html --out page.html\n  bddreport check --state report.archive.json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Log debug events to stderr (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Generate(GenerateArgs),
    Scan(ScanArgs),
    Fetch(FetchArgs),
    Check(CheckArgs),
    InitConfig(InitConfigArgs),
}

#[derive(Parser, Debug)]
#[command(about = "Aggregate result files, write the report, and fingerprint it")]
pub struct GenerateArgs {
    /// Directory searched recursively for result JSON files
    #[arg(long, value_name = "DIR")]
    pub input: PathBuf,

    /// Report directory to write
    #[arg(long, value_name = "DIR")]
    pub output: PathBuf,

    /// Report config JSON; flags below override its fields
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Archive state file (default: <output>.archive.json next to the report)
    #[arg(long, value_name = "PATH")]
    pub state: Option<PathBuf>,

    /// Glob (relative to --input) selecting result files
    #[arg(long, value_name = "GLOB")]
    pub include: Option<String>,

    /// Glob (relative to --input) of result files to skip
    #[arg(long, value_name = "GLOB")]
    pub exclude: Option<String>,

    /// Statuses that count as failed (skipped, pending, undefined, missing)
    #[arg(long, value_name = "STATUS", value_delimiter = ',')]
    pub escalate: Vec<Status>,

    /// Combine features that share a name into one
    #[arg(long)]
    pub merge_features: bool,

    /// Abort when any result file fails to parse
    #[arg(long)]
    pub strict: bool,

    /// Exit with status 1 when a threshold is exceeded
    #[arg(long)]
    pub fail_on_breach: bool,

    /// Project name shown in page headers
    #[arg(long, value_name = "NAME")]
    pub project_name: Option<String>,

    /// Build label shown next to the project name
    #[arg(long, value_name = "LABEL")]
    pub build_label: Option<String>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Fingerprint an existing report directory")]
pub struct ScanArgs {
    /// Report directory to fingerprint
    #[arg(long, value_name = "DIR")]
    pub report: PathBuf,

    /// Archive state file to write (default: <report>.archive.json)
    #[arg(long, value_name = "PATH")]
    pub state: Option<PathBuf>,

    /// Report config JSON supplying safe extensions, trusted dirs and index file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(
    about = "Serve one file from a fingerprinted report",
    after_help = "Exit codes: 0 served, 3 redirect, 4 not found, 5 forbidden"
)]
pub struct FetchArgs {
    /// Archive state file written by generate or scan
    #[arg(long, value_name = "PATH")]
    pub state: PathBuf,

    /// Path relative to the report root (empty for the index)
    #[arg(value_name = "PATH", default_value = "")]
    pub path: String,

    /// Write served bytes here instead of stdout
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Re-hash every fingerprinted file and list drift (exit 1 on drift)")]
pub struct CheckArgs {
    /// Archive state file written by generate or scan
    #[arg(long, value_name = "PATH")]
    pub state: PathBuf,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Write a default report config")]
pub struct InitConfigArgs {
    /// Destination for the config JSON (stdout when omitted)
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}
