//! `om-validate`: checks the symbols of an OpenMath object against the
//! Content Dictionaries on the search path.
//!
//! Dictionaries are loaded from each `--cd-path` directory, then from the
//! `OM_CD_PATH` environment variable (`;`-separated), then `./cd` and `./`.
//! With `--cd-group`, only the members of that `.cdg` group are used.
//!
//! **Usage:**
//! ```text
//! om-validate <input> [--cd-path <dir>]... [--cd-group <file>] [--format text|json]
//! ```
//!
//! Exits non-zero if any check fails.

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use openmath::codec;
use openmath_cd::{parse_cdg, validate, Registry, SearchPath, Severity, ValidationReport};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

/// Validate an OpenMath object against Content Dictionaries.
#[derive(Parser)]
#[command(
    name = "om-validate",
    about = "Validate OpenMath symbols against Content Dictionaries"
)]
struct Args {
    /// Input file, or `-` for standard input.
    input: PathBuf,

    /// Directory to load `.ocd` files from; may be repeated.
    #[arg(long = "cd-path")]
    cd_path: Vec<PathBuf>,

    /// Content Dictionary group (`.cdg`) restricting the loaded dictionaries.
    #[arg(long = "cd-group")]
    cd_group: Option<PathBuf>,

    /// Report format.
    #[arg(long, value_enum, default_value = "text")]
    format: ReportFormat,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let text = if args.input.as_os_str() == "-" {
        io::read_to_string(io::stdin()).context("Failed to read standard input")?
    } else {
        fs::read_to_string(&args.input)
            .with_context(|| format!("Failed to read {}", args.input.display()))?
    };
    let om = codec::parse(&text)
        .with_context(|| format!("Failed to decode {}", args.input.display()))?;

    let mut registry = Registry::from_search_path(&SearchPath::new(args.cd_path));
    if let Some(path) = &args.cd_group {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let group =
            parse_cdg(&text).with_context(|| format!("Failed to parse {}", path.display()))?;
        registry = group.select(&registry);
        info!(group = %group.name, "restricted to content dictionary group");
    }
    info!(dictionaries = registry.len(), "loaded content dictionaries");

    let report = validate(&om, &registry);
    match args.format {
        ReportFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        ),
        ReportFormat::Text => print_text(&report),
    }

    let failed = report.failure_count();
    if failed > 0 {
        eprintln!("Validation FAILED: {failed} check(s) did not pass.");
        process::exit(1);
    }
    Ok(())
}

fn print_text(report: &ValidationReport) {
    println!("OpenMath Validation Report");
    println!("==========================");
    println!();

    for finding in &report.findings {
        let status = match finding.severity {
            Severity::Pass => "PASS",
            Severity::Warning => "WARN",
            Severity::Failure => "FAIL",
        };
        println!("[{status}] {}: {}", finding.check, finding.message);
        for detail in &finding.details {
            println!("       {detail}");
        }
    }

    let failed = report.failure_count();
    let warned = report.warning_count();
    let passed = report.findings.len() - failed - warned;
    println!();
    println!("Summary: {passed} passed, {warned} warnings, {failed} failed");
}
