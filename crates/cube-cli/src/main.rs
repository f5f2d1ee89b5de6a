//! cube - create and inspect chunked image cubes
//!
//! The label of each cube is kept next to it as `<cube>.label.json`.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use cube_core::PixelType;
use cube_io::{CubeFormat, IoConfig, WriteThreadMode};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "cube")]
#[command(author, version, about = "Create and inspect chunked image cubes")]
#[command(long_about = "
Create, describe and sample band-sequential or tiled image cubes.

Examples:
  cube create dem.cub -s 2048 -l 2048 -t SignedWord    # Null-filled tiled cube
  cube create flat.cub -s 100 -l 100 -b 3 --fill 1.5   # Constant cube
  cube info dem.cub --json                             # Geometry and layout
  cube stats dem.cub --band 1                          # Valid range and specials
  cube dump dem.cub --sample 10 --line 10 -W 4 -H 4    # Print DNs
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Background write worker: optimized, always or off (overrides CUBE_WRITE_THREAD)
    #[arg(long, global = true)]
    write_thread: Option<WriteThreadMode>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new cube
    #[command(visible_alias = "c")]
    Create(CreateArgs),

    /// Show cube geometry and layout
    #[command(visible_alias = "i")]
    Info(InfoArgs),

    /// Per-band statistics
    Stats(StatsArgs),

    /// Print a rectangle of DNs
    Dump(DumpArgs),
}

#[derive(Args)]
struct CreateArgs {
    /// Output cube
    output: PathBuf,

    /// Samples
    #[arg(short, long, default_value = "512")]
    samples: usize,

    /// Lines
    #[arg(short, long, default_value = "512")]
    lines: usize,

    /// Bands
    #[arg(short, long, default_value = "1")]
    bands: usize,

    /// Pixel type (UnsignedByte, SignedByte, UnsignedWord, SignedWord,
    /// UnsignedInteger, SignedInteger, Real, Double)
    #[arg(short = 't', long = "type", default_value = "Real")]
    pixel_type: PixelType,

    /// Layout: tile or bsq
    #[arg(short, long, default_value = "tile")]
    format: CubeFormat,

    /// Tile width (tile layout only)
    #[arg(long)]
    tile_samples: Option<usize>,

    /// Tile height (tile layout only)
    #[arg(long)]
    tile_lines: Option<usize>,

    /// Additive scale for integer types
    #[arg(long, default_value = "0")]
    base: f64,

    /// Multiplicative scale for integer types
    #[arg(long, default_value = "1")]
    multiplier: f64,

    /// Value written to every pixel (default leaves the cube Null)
    #[arg(long)]
    fill: Option<f64>,
}

#[derive(Args)]
struct InfoArgs {
    /// Input cube
    input: PathBuf,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct StatsArgs {
    /// Input cube
    input: PathBuf,

    /// Only this band (default: all)
    #[arg(long)]
    band: Option<i64>,
}

#[derive(Args)]
struct DumpArgs {
    /// Input cube
    input: PathBuf,

    /// First sample
    #[arg(long, default_value = "1")]
    sample: i64,

    /// First line
    #[arg(long, default_value = "1")]
    line: i64,

    /// Band
    #[arg(long, default_value = "1")]
    band: i64,

    /// Samples to print
    #[arg(short = 'W', long, default_value = "8")]
    width: usize,

    /// Lines to print
    #[arg(short = 'H', long, default_value = "8")]
    height: usize,
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config = match cli.write_thread {
        Some(mode) => IoConfig::new(mode),
        None => IoConfig::from_env(),
    };

    match cli.command {
        Commands::Create(args) => commands::create::run(args, config),
        Commands::Info(args) => commands::info::run(args, config),
        Commands::Stats(args) => commands::stats::run(args, config),
        Commands::Dump(args) => commands::dump::run(args, config),
    }
}
