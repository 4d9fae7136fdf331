//! `om-convert`: converts OpenMath objects between the JSON and XML encodings.
//!
//! **Usage:**
//! ```text
//! om-convert <input> [--from auto|json|xml] [--to json|xml] [--indent N]
//!            [--hex-integers] [--hex-floats] [--dereference] [--base-dir DIR]
//!            [--out PATH]
//! ```
//!
//! `-` as input reads standard input. Without `--from`, the encoding is taken
//! from the file extension or detected from the first character.

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use openmath::codec::{self, Encoding, FloatStyle, IntegerStyle, XmlOptions};
use openmath::{resolve, DefaultFetcher, Om};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum InputFormat {
    Auto,
    Json,
    Xml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Xml,
}

/// Convert an OpenMath object between encodings.
#[derive(Parser)]
#[command(name = "om-convert", about = "Convert OpenMath objects between JSON and XML")]
struct Args {
    /// Input file, or `-` for standard input.
    input: PathBuf,

    /// Input encoding.
    #[arg(long, value_enum, default_value = "auto")]
    from: InputFormat,

    /// Output encoding.
    #[arg(long, value_enum, default_value = "xml")]
    to: OutputFormat,

    /// Indent width; compact output when absent.
    #[arg(long)]
    indent: Option<usize>,

    /// Write XML integers in hexadecimal.
    #[arg(long)]
    hex_integers: bool,

    /// Write XML floats as IEEE-754 bit patterns.
    #[arg(long)]
    hex_floats: bool,

    /// Replace every reference with a copy of its target first.
    #[arg(long)]
    dereference: bool,

    /// Directory relative references are resolved against (default: the
    /// input file's directory).
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Output file (default: standard output).
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let stdin = args.input.as_os_str() == "-";

    let text = if stdin {
        io::read_to_string(io::stdin()).context("Failed to read standard input")?
    } else {
        fs::read_to_string(&args.input)
            .with_context(|| format!("Failed to read {}", args.input.display()))?
    };

    let encoding = match args.from {
        InputFormat::Json => Some(Encoding::Json),
        InputFormat::Xml => Some(Encoding::Xml),
        InputFormat::Auto if stdin => None,
        InputFormat::Auto => Encoding::from_path(&args.input.to_string_lossy()),
    };
    debug!(encoding = encoding.map_or("detect", Encoding::as_str), "decoding input");
    let mut om = match encoding {
        Some(encoding) => encoding.parse(&text),
        None => codec::parse(&text),
    }
    .with_context(|| format!("Failed to decode {}", args.input.display()))?;

    if args.dereference {
        let base = args
            .base_dir
            .clone()
            .or_else(|| input_dir(&args.input, stdin))
            .unwrap_or_else(|| PathBuf::from("."));
        om = resolve::dereference(&om, DefaultFetcher::with_base_dir(&base))
            .with_context(|| format!("Failed to dereference against {}", base.display()))?;
    }

    let output = encode(&om, &args);
    match &args.out {
        Some(path) => fs::write(path, output)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{output}"),
    }
    Ok(())
}

fn input_dir(input: &Path, stdin: bool) -> Option<PathBuf> {
    if stdin {
        return None;
    }
    input
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

fn encode(om: &Om, args: &Args) -> String {
    match args.to {
        OutputFormat::Json if args.indent.is_some() => om.to_json_pretty(),
        OutputFormat::Json => om.to_json(),
        OutputFormat::Xml => om.to_xml_with(&XmlOptions {
            integers: if args.hex_integers {
                IntegerStyle::Hexadecimal
            } else {
                IntegerStyle::Decimal
            },
            floats: if args.hex_floats {
                FloatStyle::Hexadecimal
            } else {
                FloatStyle::Decimal
            },
            indent: args.indent,
            declaration: args.indent.is_some(),
        }),
    }
}
