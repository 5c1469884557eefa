use std::io::{BufWriter, Write};
use std::path::Path;

use super::PlyError;
use crate::pointcloud::PointCloud;

/// Write a point cloud as a `binary_little_endian` PLY file.
///
/// Positions (and normals, if any) are stored as `double`. Colors, if any, are stored as
/// `uchar` after rounding the 0-1 values to 8 bits.
pub fn write_ply_binary(path: impl AsRef<Path>, cloud: &PointCloud) -> Result<(), PlyError> {
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "ply")?;
    writeln!(writer, "format binary_little_endian 1.0")?;
    writeln!(writer, "element vertex {}", cloud.len())?;
    for axis in ["x", "y", "z"] {
        writeln!(writer, "property double {axis}")?;
    }
    if cloud.colors().is_some() {
        for channel in ["red", "green", "blue"] {
            writeln!(writer, "property uchar {channel}")?;
        }
    }
    if cloud.normals().is_some() {
        for axis in ["nx", "ny", "nz"] {
            writeln!(writer, "property double {axis}")?;
        }
    }
    writeln!(writer, "end_header")?;

    for (i, point) in cloud.points().iter().enumerate() {
        for v in point {
            writer.write_all(&v.to_le_bytes())?;
        }
        if let Some(colors) = cloud.colors() {
            let rgb = colors[i].map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
            writer.write_all(&rgb)?;
        }
        if let Some(normals) = cloud.normals() {
            for v in normals[i] {
                writer.write_all(&v.to_le_bytes())?;
            }
        }
    }

    writer.flush()?;
    log::debug!("wrote {} vertices", cloud.len());
    Ok(())
}
