//! iffrw Command Line Interface

#![deny(missing_docs)]

use std::fs;
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, crate_version};
use itertools::Itertools;
use tracing::Level;
use tracing::instrument;
use tracing_subscriber::FmtSubscriber;
use iffrw::{Chunk, ChunkRegistry, FourCC, IffError, QualityLevel, StructureError};

#[derive(Parser, Debug)]
#[command(author, about, long_about = None,
    disable_help_flag = true,
    disable_version_flag = true,
    next_help_heading="Global Options",
    version=crate_version!())]
struct IffrwArgs {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, global = true, action=ArgAction::Help,
        help = "Print help")]
    help: (),

    #[arg(long, short='V', action=ArgAction::Version,
        help = "Print version")]
    version: (),
}

#[derive(Subcommand, Debug)]
enum Commands {
    Read(ReadConfig),
    Write(WriteConfig),
    Check(CheckConfig),
    Pretty(PrettyConfig),
    Compare(CompareConfig),
    Join(JoinConfig),
}

/// Parse an IFF file and summarize its structure
#[derive(Parser, Debug)]
#[command(long_about = None)]
struct ReadConfig {
    /// Input path (stdin if absent)
    #[arg(long = "in", short, value_name = "PATH")]
    input: Option<PathBuf>,
}

/// Parse an IFF file and serialize it back out
#[derive(Parser, Debug)]
#[command(long_about = None)]
struct WriteConfig {
    /// Input path (stdin if absent)
    #[arg(long = "in", short, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Output path (stdout if absent)
    #[arg(long = "out", short, value_name = "PATH")]
    output: Option<PathBuf>,
}

/// Check an IFF file against the structural rules of the format
#[derive(Parser, Debug)]
#[command(long_about = None)]
struct CheckConfig {
    /// Input path (stdin if absent)
    #[arg(long = "in", short, value_name = "PATH")]
    input: Option<PathBuf>,
}

/// Print a human-readable dump of an IFF file
#[derive(Parser, Debug)]
#[command(long_about = None)]
struct PrettyConfig {
    /// Input path (stdin if absent)
    #[arg(long = "in", short, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Output path (stdout if absent)
    #[arg(long = "out", short, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Initial indent level of the dump
    #[arg(long, default_value_t = 0)]
    indent: usize,
}

/// Compare two IFF files for deep structural equality
#[derive(Parser, Debug)]
#[command(long_about = None)]
struct CompareConfig {
    /// First file
    a: PathBuf,

    /// Second file
    b: PathBuf,
}

/// Concatenate IFF files into a single CAT
#[derive(Parser, Debug)]
#[command(long_about = None)]
struct JoinConfig {
    /// Files to concatenate
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output path (stdout if absent)
    #[arg(long = "out", short, value_name = "PATH")]
    output: Option<PathBuf>,
}

// Exit codes: 0 success, 1 I/O error, 2 structural error, 3 validation
// failure (including "trees differ" from compare).
const EXIT_IO: u8 = 1;
const EXIT_STRUCTURE: u8 = 2;
const EXIT_QUALITY: u8 = 3;

fn exit_code_for(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<StructureError>().is_some() {
        return EXIT_STRUCTURE;
    }
    match err.downcast_ref::<IffError>() {
        Some(IffError::Structure { .. }) => EXIT_STRUCTURE,
        Some(IffError::Io { .. }) | None => EXIT_IO,
    }
}

// The parser needs Seek, so stdin is buffered fully before parsing.
fn open_input(path: Option<&PathBuf>) -> Result<Cursor<Vec<u8>>> {
    let mut data = Vec::new();
    match path {
        Some(path) => {
            File::open(path)
                .with_context(|| format!("opening {}", path.display()))?
                .read_to_end(&mut data)
                .with_context(|| format!("reading {}", path.display()))?;
        }
        None => {
            std::io::stdin()
                .lock()
                .read_to_end(&mut data)
                .context("reading stdin")?;
        }
    }
    Ok(Cursor::new(data))
}

fn write_output(path: Option<&PathBuf>, data: &[u8]) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, data).with_context(|| format!("writing {}", path.display()))?;
        }
        None => {
            std::io::stdout()
                .lock()
                .write_all(data)
                .context("writing stdout")?;
        }
    }
    Ok(())
}

fn parse_input(path: Option<&PathBuf>, registry: &ChunkRegistry) -> Result<Chunk> {
    let mut input = open_input(path)?;
    let chunk = iffrw::read(&mut input, registry)?;
    Ok(chunk)
}

fn child_name(chunk: &Chunk) -> String {
    match chunk.contents_type() {
        Some(contents_type) => format!("{}-{}", chunk.id.to_string().trim(), contents_type),
        None => chunk.id.to_string().trim().to_string(),
    }
}

#[instrument]
fn read(config: &ReadConfig) -> Result<ExitCode> {
    let registry = ChunkRegistry::new();
    let chunk = parse_input(config.input.as_ref(), &registry)?;
    let on_wire = 8 + i64::from(chunk.size) + i64::from(chunk.size & 1);
    match chunk.contents_type() {
        Some(contents_type) => println!(
            "{}.{}: {} bytes, {} children: {}",
            chunk.id,
            contents_type,
            on_wire,
            chunk.children().len(),
            chunk.children().iter().map(child_name).join(", "),
        ),
        None => println!("{}: {} bytes", chunk.id, on_wire),
    }
    Ok(ExitCode::SUCCESS)
}

#[instrument]
fn write(config: &WriteConfig) -> Result<ExitCode> {
    let registry = ChunkRegistry::new();
    let chunk = parse_input(config.input.as_ref(), &registry)?;
    let mut out = Cursor::new(Vec::new());
    iffrw::write(&mut out, &chunk, &registry)?;
    write_output(config.output.as_ref(), out.get_ref())?;
    Ok(ExitCode::SUCCESS)
}

#[instrument]
fn check(config: &CheckConfig) -> Result<ExitCode> {
    let registry = ChunkRegistry::new();
    let chunk = parse_input(config.input.as_ref(), &registry)?;
    let level = iffrw::check_with_report(&chunk, &mut |message| {
        eprintln!("{} at {}: {}", message.level, message.path, message.message);
    });
    println!("{level}");
    if level < QualityLevel::Ok {
        Ok(ExitCode::from(EXIT_QUALITY))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

#[instrument]
fn pretty(config: &PrettyConfig) -> Result<ExitCode> {
    let registry = ChunkRegistry::new();
    let chunk = parse_input(config.input.as_ref(), &registry)?;
    let mut out = Vec::new();
    iffrw::print(&mut out, &chunk, config.indent).context("formatting dump")?;
    write_output(config.output.as_ref(), &out)?;
    Ok(ExitCode::SUCCESS)
}

#[instrument]
fn compare(config: &CompareConfig) -> Result<ExitCode> {
    let registry = ChunkRegistry::new();
    let a = parse_input(Some(&config.a), &registry)?;
    let b = parse_input(Some(&config.b), &registry)?;
    if iffrw::compare(&a, &b) {
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{} and {} differ", config.a.display(), config.b.display());
        Ok(ExitCode::from(EXIT_QUALITY))
    }
}

#[instrument]
fn join(config: &JoinConfig) -> Result<ExitCode> {
    let registry = ChunkRegistry::new();
    let mut chunks = Vec::new();
    for path in &config.inputs {
        let chunk = parse_input(Some(path), &registry)?;
        if chunk.contents_type().is_none() {
            eprintln!(
                "{}: top-level {} is not joinable, only FORM, LIST and CAT are",
                path.display(),
                chunk.id
            );
            return Ok(ExitCode::from(EXIT_STRUCTURE));
        }
        chunks.push(chunk);
    }

    // CAT of the common form type, or the blank wildcard for mixed input.
    let contents_type = chunks
        .iter()
        .map(|chunk| chunk.contents_type())
        .all_equal_value()
        .ok()
        .flatten()
        .unwrap_or(FourCC::BLANK);
    // Summed sizes can overflow the 32-bit size field for real inputs;
    // surface that as a structural error rather than a panic.
    let cat = Chunk::cat(contents_type, chunks)?;

    let mut out = Cursor::new(Vec::new());
    iffrw::write(&mut out, &cat, &registry)?;
    write_output(config.output.as_ref(), out.get_ref())?;
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let args = IffrwArgs::parse();

    let result = match &args.command {
        Commands::Read(config) => read(config),
        Commands::Write(config) => write(config),
        Commands::Check(config) => check(config),
        Commands::Pretty(config) => pretty(config),
        Commands::Compare(config) => compare(config),
        Commands::Join(config) => join(config),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("iffrw: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

#[test]
fn verify_args() {
    use clap::CommandFactory;
    IffrwArgs::command().debug_assert();
}
