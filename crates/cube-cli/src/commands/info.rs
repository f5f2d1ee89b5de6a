//! Cube info command.
//!
//! Displays geometry, pixel storage, and chunk layout.

use crate::InfoArgs;
use anyhow::Result;
use cube_io::{label::keys, Cube, IoConfig};
use serde_json::json;

pub fn run(args: InfoArgs, config: IoConfig) -> Result<()> {
    let cube = super::open_cube(&args.input, config)?;
    if args.json {
        print_json(&cube)
    } else {
        print_text(&cube)
    }
}

fn print_text(cube: &Cube) -> Result<()> {
    let handler = cube.handler()?;
    let label = cube.label();
    let shape = handler.chunk_shape();

    println!("{}", cube.path().display());
    println!(
        "  Dimensions: {}x{}x{}",
        handler.samples(),
        handler.lines(),
        handler.bands()
    );
    println!("  Pixel type: {}", handler.pixel_type());
    println!("  Byte order: {}", label.get(keys::BYTE_ORDER).unwrap_or("?"));
    println!(
        "  Scaling:    base {} multiplier {}",
        label.get(keys::BASE).unwrap_or("0"),
        label.get(keys::MULTIPLIER).unwrap_or("1")
    );
    println!("  Format:     {}", handler.format());
    println!(
        "  Chunks:     {} of {} ({}x{}x{} grid)",
        handler.chunk_count(),
        shape,
        handler.chunks_in_samples(),
        handler.chunks_in_lines(),
        handler.chunks_in_bands()
    );
    println!("  Data start: {}", handler.data_start_byte());
    println!("  Data size:  {}", super::format_size(handler.data_size()));
    Ok(())
}

fn print_json(cube: &Cube) -> Result<()> {
    let handler = cube.handler()?;
    let shape = handler.chunk_shape();
    let value = json!({
        "file": cube.path().display().to_string(),
        "samples": handler.samples(),
        "lines": handler.lines(),
        "bands": handler.bands(),
        "pixel_type": handler.pixel_type().label_name(),
        "format": handler.format().label_name(),
        "chunk_shape": shape,
        "chunk_count": handler.chunk_count(),
        "data_start": handler.data_start_byte(),
        "data_size": handler.data_size(),
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
