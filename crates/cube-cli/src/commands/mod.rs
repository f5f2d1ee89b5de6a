//! CLI command implementations

pub mod create;
pub mod dump;
pub mod info;
pub mod stats;

use anyhow::{Context, Result};
use cube_io::{AccessMode, Cube, IoConfig, Label};
use std::path::{Path, PathBuf};

/// Sidecar holding the label of `cube`.
pub fn label_path(cube: &Path) -> PathBuf {
    let mut name = cube.as_os_str().to_os_string();
    name.push(".label.json");
    PathBuf::from(name)
}

/// Opens a cube read-only using its sidecar label.
pub fn open_cube(path: &Path, config: IoConfig) -> Result<Cube> {
    let sidecar = label_path(path);
    let label = Label::load_json(&sidecar)
        .with_context(|| format!("Failed to load label: {}", sidecar.display()))?;
    Cube::open_with_config(path, label, AccessMode::ReadOnly, None, config)
        .with_context(|| format!("Failed to open: {}", path.display()))
}

/// Byte count in binary units, e.g. `1.50 MiB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} bytes");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// DN for display: the special pixel name or the value.
pub fn format_dn(dn: f64) -> String {
    match cube_core::SpecialPixel::classify(dn) {
        Some(special) => special.name().to_string(),
        None => format!("{dn}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_name() {
        assert_eq!(label_path(Path::new("a/b.cub")), PathBuf::from("a/b.cub.label.json"));
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size(10), "10 bytes");
        assert_eq!(format_size(2048), "2.00 KiB");
        assert_eq!(format_size(3 * 1024 * 1024 / 2), "1.50 MiB");
    }

    #[test]
    fn dns() {
        assert_eq!(format_dn(cube_core::NULL8), "Null");
        assert_eq!(format_dn(2.5), "2.5");
    }
}
