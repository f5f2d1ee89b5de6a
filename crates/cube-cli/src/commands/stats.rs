//! Band statistics command.
//!
//! Reads every band line by line and reports the valid range, mean and
//! special pixel counts.

use crate::StatsArgs;
use anyhow::{bail, Result};
use cube_core::{Buffer, PixelType, SpecialPixel};
use cube_io::IoConfig;

/// Running statistics of one band.
#[derive(Debug, Default)]
pub struct BandStats {
    pub valid: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub sum: f64,
    pub specials: [u64; 5],
}

impl BandStats {
    pub fn add(&mut self, dn: f64) {
        match SpecialPixel::classify(dn) {
            Some(special) => self.specials[slot(special)] += 1,
            None => {
                self.valid += 1;
                self.sum += dn;
                self.min = Some(self.min.map_or(dn, |m| m.min(dn)));
                self.max = Some(self.max.map_or(dn, |m| m.max(dn)));
            }
        }
    }

    pub fn mean(&self) -> Option<f64> {
        (self.valid > 0).then(|| self.sum / self.valid as f64)
    }

    pub fn count(&self, special: SpecialPixel) -> u64 {
        self.specials[slot(special)]
    }
}

fn slot(special: SpecialPixel) -> usize {
    SpecialPixel::ALL
        .iter()
        .position(|&s| s == special)
        .unwrap_or(0)
}

pub fn run(args: StatsArgs, config: IoConfig) -> Result<()> {
    let mut cube = super::open_cube(&args.input, config)?;
    let samples = cube.samples()?;
    let lines = cube.lines()?;
    let bands = cube.band_count() as i64;

    let selected: Vec<i64> = match args.band {
        Some(b) if b < 1 || b > bands => bail!("band {b} out of range 1..={bands}"),
        Some(b) => vec![b],
        None => (1..=bands).collect(),
    };

    let mut line = Buffer::line(samples as usize, PixelType::F8)?;
    for band in selected {
        let mut stats = BandStats::default();
        for l in 1..=lines {
            line.set_base_position(1, l, band);
            cube.read(&mut line)?;
            for &dn in line.dns() {
                stats.add(dn);
            }
        }
        print_band(band, &stats);
    }
    cube.close()?;
    Ok(())
}

fn print_band(band: i64, stats: &BandStats) {
    println!("Band {band}");
    println!("  Valid pixels: {}", stats.valid);
    if let (Some(min), Some(max), Some(mean)) = (stats.min, stats.max, stats.mean()) {
        println!("  Min:          {min}");
        println!("  Max:          {max}");
        println!("  Mean:         {mean:.6}");
    }
    for special in SpecialPixel::ALL {
        println!("  {:<13} {}", format!("{}:", special.name()), stats.count(special));
    }
}
