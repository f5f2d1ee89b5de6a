//! Create command.
//!
//! Creates a cube, optionally fills it line by line, and saves the label
//! sidecar.

use crate::CreateArgs;
use anyhow::{Context, Result};
use cube_core::{Buffer, PixelType};
use cube_io::{Cube, CubeSpec, IoConfig};
use tracing::info;

pub fn run(args: CreateArgs, config: IoConfig) -> Result<()> {
    let spec = CubeSpec {
        samples: args.samples,
        lines: args.lines,
        bands: args.bands,
        pixel_type: args.pixel_type,
        format: args.format,
        base: args.base,
        multiplier: args.multiplier,
        tile_samples: args.tile_samples,
        tile_lines: args.tile_lines,
        ..Default::default()
    };

    let mut cube = Cube::create_with_config(&args.output, &spec, config)
        .with_context(|| format!("Failed to create: {}", args.output.display()))?;

    if let Some(value) = args.fill {
        let mut line = Buffer::line(spec.samples, PixelType::F8)?;
        line.fill(value);
        for band in 1..=spec.bands as i64 {
            for l in 1..=spec.lines as i64 {
                line.set_base_position(1, l, band);
                cube.write(&line)
                    .with_context(|| format!("Failed to write line {l} of band {band}"))?;
            }
        }
        info!(value, "filled cube");
    }

    let label = cube.label().clone();
    cube.close()
        .with_context(|| format!("Failed to close: {}", args.output.display()))?;

    let sidecar = super::label_path(&args.output);
    label
        .save_json(&sidecar)
        .with_context(|| format!("Failed to save label: {}", sidecar.display()))?;

    println!(
        "{}: {}x{}x{} {} ({})",
        args.output.display(),
        spec.samples,
        spec.lines,
        spec.bands,
        spec.pixel_type,
        spec.format
    );
    Ok(())
}
