use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

mod aggregate;
mod classify;
mod cli;
mod config;
mod loader;
mod model;
mod publisher;
mod render;
mod staging;
mod tags;
mod util;

use aggregate::thresholds::{evaluate, Verdict};
use aggregate::{
    classify_features, merge_features_by_name, merge_features_by_uri, summarize, ReportSummary,
};
use classify::Status;
use cli::{CheckArgs, Command, FetchArgs, GenerateArgs, InitConfigArgs, RootArgs, ScanArgs};
use config::{default_config, load_config, validate_config, ReportConfig};
use publisher::{load_state, save_state, SafeArchive, ServeResponse};
use render::{write_report, HtmlRenderer, ReportContext};

const DEFAULT_PROJECT_NAME: &str = "Test report";

const EXIT_BREACH: u8 = 1;
const EXIT_ERROR: u8 = 2;
const EXIT_REDIRECT: u8 = 3;
const EXIT_NOT_FOUND: u8 = 4;
const EXIT_FORBIDDEN: u8 = 5;

fn main() -> ExitCode {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    let result = match args.command {
        Command::Generate(args) => cmd_generate(args),
        Command::Scan(args) => cmd_scan(args),
        Command::Fetch(args) => cmd_fetch(args),
        Command::Check(args) => cmd_check(args),
        Command::InitConfig(args) => cmd_init_config(args),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

#[derive(Serialize)]
struct GenerateOutput<'a> {
    report_dir: &'a Path,
    state: &'a Path,
    result_files: usize,
    load_failures: Vec<String>,
    escalated: Vec<Status>,
    fingerprinted: usize,
    summary: &'a ReportSummary,
    verdict: &'a Verdict,
}

fn cmd_generate(args: GenerateArgs) -> Result<ExitCode> {
    let start = Instant::now();
    let config = generate_config(&args)?;
    let state_path = resolve_state_path(args.state.as_deref(), &args.output)?;

    let files =
        loader::find_result_files(&args.input, &config.include, config.exclude.as_deref())?;
    if files.is_empty() {
        tracing::warn!(input = %args.input.display(), "no result files matched");
    }
    let loaded = loader::load_result_files(&files);
    let load_failures: Vec<String> = loaded
        .failures
        .iter()
        .map(|failure| {
            format!(
                "{}: {:#}",
                util::display_path(&failure.path, Some(&args.input)),
                failure.error
            )
        })
        .collect();
    if !load_failures.is_empty() {
        if args.strict {
            return Err(anyhow!(
                "failed to load result files:\n  {}",
                load_failures.join("\n  ")
            ));
        }
        if loaded.documents.is_empty() {
            return Err(anyhow!(
                "no result file could be loaded:\n  {}",
                load_failures.join("\n  ")
            ));
        }
    }

    let mut features = loaded.into_features();
    if config.merge_features {
        features = merge_features_by_name(features);
    }
    let features = merge_features_by_uri(features);
    let policy = config.policy();
    let classified = classify_features(&features, &policy)?;
    let summary = summarize(&classified);
    let verdict = evaluate(&summary, &config.thresholds);
    let tag_index = tags::build_tag_index(&classified);
    tracing::info!(
        files = files.len(),
        features = summary.features,
        scenarios = summary.scenarios,
        steps = summary.steps.total,
        tags = tag_index.len(),
        "aggregated results"
    );

    let ctx = ReportContext {
        project_name: config.project_name.as_deref().unwrap_or(DEFAULT_PROJECT_NAME),
        build_label: config.build_label.as_deref(),
        index_file: &config.index_file,
        features: &classified,
        tags: &tag_index,
        summary: &summary,
        verdict: &verdict,
    };
    write_report(&HtmlRenderer, &ctx, &args.output)?;

    let report_root = fs::canonicalize(&args.output)
        .with_context(|| format!("resolve {}", args.output.display()))?;
    let archive = SafeArchive::new(report_root.clone(), config.archive_settings());
    let fingerprinted = archive.scan()?;
    save_state(&state_path, &archive.state())?;
    tracing::info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        "generate complete"
    );

    if args.json {
        let output = GenerateOutput {
            report_dir: &report_root,
            state: &state_path,
            result_files: files.len(),
            load_failures,
            escalated: policy.statuses().collect(),
            fingerprinted,
            summary: &summary,
            verdict: &verdict,
        };
        let text = serde_json::to_string_pretty(&output).context("serialize generate output")?;
        println!("{text}");
    } else {
        print_summary(&summary, &verdict);
        let escalated: Vec<&str> = policy.statuses().map(|status| status.as_str()).collect();
        if !escalated.is_empty() {
            println!("escalated: {}", escalated.join(", "));
        }
        for failure in &load_failures {
            println!("skipped result file {failure}");
        }
        println!("report: {}", report_root.display());
        println!("state: {}", state_path.display());
    }

    let fail_on_breach = args.fail_on_breach || config.fail_on_breach;
    if verdict.failed() && fail_on_breach {
        return Ok(ExitCode::from(EXIT_BREACH));
    }
    Ok(ExitCode::SUCCESS)
}

/// Config file (or defaults) with command-line overrides applied, validated.
fn generate_config(args: &GenerateArgs) -> Result<ReportConfig> {
    let mut config = match args.config.as_deref() {
        Some(path) => load_config(path)?,
        None => default_config(),
    };
    if let Some(include) = &args.include {
        config.include = include.clone();
    }
    if let Some(exclude) = &args.exclude {
        config.exclude = Some(exclude.clone());
    }
    for status in &args.escalate {
        config.escalate_status(*status);
    }
    config.merge_features |= args.merge_features;
    if let Some(name) = &args.project_name {
        config.project_name = Some(name.clone());
    }
    if let Some(label) = &args.build_label {
        config.build_label = Some(label.clone());
    }
    validate_config(&config)?;
    Ok(config)
}

fn print_summary(summary: &ReportSummary, verdict: &Verdict) {
    let steps = &summary.steps;
    println!(
        "features: {} ({} failed)",
        summary.features, summary.failed_features
    );
    println!(
        "scenarios: {} ({} failed)",
        summary.scenarios, summary.failed_scenarios
    );
    println!(
        "steps: {} (passed {}, failed {}, skipped {}, pending {}, undefined {}, missing {})",
        steps.total,
        steps.passed,
        steps.failed,
        steps.skipped,
        steps.pending,
        steps.undefined,
        steps.missing
    );
    println!("duration: {}", summary.duration);
    println!("status: {}", summary.status());
    for breach in &verdict.breaches {
        println!("threshold: {}", breach.message());
    }
}

fn cmd_scan(args: ScanArgs) -> Result<ExitCode> {
    let config = match args.config.as_deref() {
        Some(path) => load_config(path)?,
        None => default_config(),
    };
    validate_config(&config)?;
    let state_path = resolve_state_path(args.state.as_deref(), &args.report)?;
    let report_root = fs::canonicalize(&args.report)
        .with_context(|| format!("resolve {}", args.report.display()))?;
    let archive = SafeArchive::new(report_root, config.archive_settings());
    let fingerprinted = archive.scan()?;
    save_state(&state_path, &archive.state())?;
    println!("fingerprinted {fingerprinted} files");
    println!("index: {}", archive.settings().index_file);
    println!("state: {}", state_path.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_fetch(args: FetchArgs) -> Result<ExitCode> {
    let archive = SafeArchive::from_state(load_state(&args.state)?)?;
    let response = archive.serve(&args.path);
    let code = match &response {
        ServeResponse::Serve(file) => {
            match args.out.as_deref() {
                Some(out) => fs::write(out, &file.bytes)
                    .with_context(|| format!("write {}", out.display()))?,
                None => {
                    let mut stdout = io::stdout().lock();
                    stdout.write_all(&file.bytes).context("write stdout")?;
                    stdout.flush().context("flush stdout")?;
                }
            }
            eprintln!(
                "serve {} (name {}, {}, {} bytes, {}{})",
                file.rel_path,
                file.file_name(),
                file.content_type,
                file.len(),
                file.verification.as_str(),
                if file.bypasses_content_security() {
                    ", content-security bypassed"
                } else {
                    ""
                }
            );
            ExitCode::SUCCESS
        }
        ServeResponse::Redirect(target) => {
            println!("redirect {target}");
            ExitCode::from(EXIT_REDIRECT)
        }
        ServeResponse::NotFound => {
            eprintln!("not found: {}", args.path);
            ExitCode::from(EXIT_NOT_FOUND)
        }
        ServeResponse::Forbidden => {
            eprintln!("forbidden: {} does not match its recorded checksum", args.path);
            ExitCode::from(EXIT_FORBIDDEN)
        }
    };
    tracing::debug!(path = %args.path, outcome = response.label(), "fetch");
    Ok(code)
}

fn cmd_check(args: CheckArgs) -> Result<ExitCode> {
    let archive = SafeArchive::from_state(load_state(&args.state)?)?;
    let report = archive.verify_all()?;
    if args.json {
        let text = serde_json::to_string_pretty(&report).context("serialize check report")?;
        println!("{text}");
    } else {
        println!("checked {} files", report.checked);
        for rel in &report.modified {
            println!("modified: {rel}");
        }
        for rel in &report.missing {
            println!("missing: {rel}");
        }
    }
    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_BREACH))
    }
}

fn cmd_init_config(args: InitConfigArgs) -> Result<ExitCode> {
    let Some(out) = args.out else {
        println!("{}", config::config_stub()?);
        return Ok(ExitCode::SUCCESS);
    };
    if out.exists() && !args.force {
        return Err(anyhow!(
            "{} already exists (pass --force to overwrite)",
            out.display()
        ));
    }
    config::write_config(&out, &default_config())?;
    println!("wrote {}", out.display());
    Ok(ExitCode::SUCCESS)
}

/// Explicit state path, or `<report>.archive.json` beside the report directory.
fn resolve_state_path(explicit: Option<&Path>, report_dir: &Path) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let name = report_dir
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .ok_or_else(|| {
            anyhow!(
                "cannot derive a state path from {}; pass --state",
                report_dir.display()
            )
        })?;
    Ok(report_dir.with_file_name(format!("{name}.archive.json")))
}
