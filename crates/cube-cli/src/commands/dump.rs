//! Dump command: prints a rectangle of one band.

use crate::DumpArgs;
use anyhow::Result;
use cube_core::{Buffer, PixelType};
use cube_io::IoConfig;

pub fn run(args: DumpArgs, config: IoConfig) -> Result<()> {
    let mut cube = super::open_cube(&args.input, config)?;
    let mut rect = Buffer::brick(args.width, args.height, 1, PixelType::F8)?;
    rect.set_base_position(args.sample, args.line, args.band);
    cube.read(&mut rect)?;

    for row in rect.dns().chunks(args.width) {
        let cells: Vec<String> = row.iter().map(|&dn| format!("{:>12}", super::format_dn(dn))).collect();
        println!("{}", cells.join(" "));
    }
    cube.close()?;
    Ok(())
}
