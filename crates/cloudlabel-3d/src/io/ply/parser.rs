use std::io::{BufRead, Read};
use std::path::Path;

use super::{
    properties::{PlyDataType, PlyPropertyDefinition, Vertex, VertexLayout},
    PlyError,
};
use crate::pointcloud::PointCloud;

// upper bound on vertices reserved ahead of reading, the header count is untrusted
const MAX_PREALLOCATED_VERTICES: usize = 1 << 20;

/// Storage format declared in the PLY header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PlyFormat {
    /// Whitespace separated text, one element per line.
    Ascii,
    /// Packed little endian records.
    BinaryLittleEndian,
}

#[derive(Debug, PartialEq)]
struct PlyElement {
    name: String,
    count: usize,
    properties: Vec<PlyPropertyDefinition>,
    has_list: bool,
}

#[derive(Debug)]
struct PlyHeader {
    format: PlyFormat,
    elements: Vec<PlyElement>,
}

fn parse_header<R: BufRead>(reader: &mut R) -> Result<PlyHeader, PlyError> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim() != "ply" {
        return Err(PlyError::InvalidHeader("missing 'ply' magic".to_string()));
    }

    let mut format = None;
    let mut elements: Vec<PlyElement> = Vec::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(PlyError::InvalidHeader("missing 'end_header'".to_string()));
        }
        let parts = line.split_whitespace().collect::<Vec<_>>();

        match parts.as_slice() {
            ["end_header"] => break,
            ["format", "ascii", ..] => format = Some(PlyFormat::Ascii),
            ["format", "binary_little_endian", ..] => format = Some(PlyFormat::BinaryLittleEndian),
            ["format", other, ..] => return Err(PlyError::UnsupportedFormat(other.to_string())),
            ["element", name, count] => {
                let count = count.parse().map_err(|_| {
                    PlyError::InvalidHeader(format!("bad count for element '{name}'"))
                })?;
                elements.push(PlyElement {
                    name: name.to_string(),
                    count,
                    properties: Vec::new(),
                    has_list: false,
                });
            }
            ["property", rest @ ..] => {
                let element = elements.last_mut().ok_or_else(|| {
                    PlyError::InvalidHeader("property declared before any element".to_string())
                })?;
                match rest {
                    ["list", ..] => element.has_list = true,
                    [data_type, name] => element.properties.push(PlyPropertyDefinition {
                        name: name.to_string(),
                        data_type: PlyDataType::parse(data_type)?,
                    }),
                    _ => {
                        return Err(PlyError::InvalidHeader(format!(
                            "malformed property line '{}'",
                            line.trim()
                        )))
                    }
                }
            }
            ["comment", ..] | ["obj_info", ..] | [] => {}
            _ => {
                return Err(PlyError::InvalidHeader(format!(
                    "unexpected header line '{}'",
                    line.trim()
                )))
            }
        }
    }

    let format = format.ok_or_else(|| PlyError::InvalidHeader("missing 'format'".to_string()))?;
    Ok(PlyHeader { format, elements })
}

/// Read the vertices of a PLY file into a point cloud.
///
/// Both `ascii` and `binary_little_endian` files are accepted. Only the `vertex` element
/// is decoded: `x`, `y`, `z` are required, `red`/`green`/`blue` and `nx`/`ny`/`nz` are
/// optional. Integer colors are rescaled to 0-1.
pub fn read_ply(path: impl AsRef<Path>) -> Result<PointCloud, PlyError> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    let header = parse_header(&mut reader)?;

    let vertex_idx = header
        .elements
        .iter()
        .position(|e| e.name == "vertex")
        .ok_or_else(|| PlyError::InvalidHeader("no vertex element".to_string()))?;

    for element in &header.elements[..vertex_idx] {
        skip_element(&mut reader, header.format, element)?;
    }

    let vertex = &header.elements[vertex_idx];
    if vertex.has_list {
        return Err(PlyError::UnsupportedProperty(
            "list property in the vertex element".to_string(),
        ));
    }
    let layout = VertexLayout::new(vertex.properties.clone())?;

    let vertices = match header.format {
        PlyFormat::BinaryLittleEndian => read_binary_vertices(&mut reader, &layout, vertex.count)?,
        PlyFormat::Ascii => read_ascii_vertices(&mut reader, &layout, vertex.count)?,
    };

    let mut points = Vec::with_capacity(vertices.len());
    let mut colors = layout.has_colors().then(|| Vec::with_capacity(vertices.len()));
    let mut normals = layout.has_normals().then(|| Vec::with_capacity(vertices.len()));

    for vertex in vertices {
        points.push(vertex.position);
        if let (Some(colors), Some(color)) = (colors.as_mut(), vertex.color) {
            colors.push(color);
        }
        if let (Some(normals), Some(normal)) = (normals.as_mut(), vertex.normal) {
            normals.push(normal);
        }
    }

    let cloud = PointCloud::new(points, colors, normals)?;
    log::debug!(
        "read {} vertices ({:?}, colors: {}, normals: {}, bounds: {:?})",
        cloud.len(),
        header.format,
        cloud.colors().is_some(),
        cloud.normals().is_some(),
        cloud.bounds()
    );

    Ok(cloud)
}

fn skip_element<R: BufRead>(
    reader: &mut R,
    format: PlyFormat,
    element: &PlyElement,
) -> Result<(), PlyError> {
    match format {
        PlyFormat::Ascii => {
            let mut line = String::new();
            for _ in 0..element.count {
                line.clear();
                if reader.read_line(&mut line)? == 0 {
                    return Err(PlyError::InvalidHeader(format!(
                        "file ends before the {} declared '{}' elements",
                        element.count, element.name
                    )));
                }
            }
        }
        PlyFormat::BinaryLittleEndian => {
            if element.has_list {
                return Err(PlyError::UnsupportedProperty(format!(
                    "list property in element '{}' stored before the vertices",
                    element.name
                )));
            }
            let record_size: usize = element.properties.iter().map(|p| p.data_type.size()).sum();
            let num_bytes = record_size
                .checked_mul(element.count)
                .ok_or_else(|| {
                    PlyError::InvalidHeader(format!(
                        "element '{}' count {} is too large",
                        element.name, element.count
                    ))
                })? as u64;
            let skipped = std::io::copy(&mut reader.by_ref().take(num_bytes), &mut std::io::sink())?;
            if skipped < num_bytes {
                return Err(PlyError::InvalidHeader(format!(
                    "file ends before the {} declared '{}' elements",
                    element.count, element.name
                )));
            }
        }
    }
    Ok(())
}

fn read_binary_vertices<R: Read>(
    reader: &mut R,
    layout: &VertexLayout,
    count: usize,
) -> Result<Vec<Vertex>, PlyError> {
    let mut buffer = vec![0u8; layout.record_size()];
    let mut values = vec![0.0; layout.properties().len()];
    let mut vertices = Vec::with_capacity(count.min(MAX_PREALLOCATED_VERTICES));

    for index in 0..count {
        reader.read_exact(&mut buffer).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => PlyError::MalformedVertex {
                index,
                reason: format!("file ends before the {count} declared vertices"),
            },
            _ => PlyError::Io(e),
        })?;

        let mut offset = 0;
        for (value, property) in values.iter_mut().zip(layout.properties()) {
            let size = property.data_type.size();
            *value = property
                .data_type
                .read_le(&buffer[offset..offset + size])
                .ok_or_else(|| PlyError::MalformedVertex {
                    index,
                    reason: format!("cannot decode property '{}'", property.name),
                })?;
            offset += size;
        }
        vertices.push(layout.split(&values));
    }

    Ok(vertices)
}

fn read_ascii_vertices<R: BufRead>(
    reader: &mut R,
    layout: &VertexLayout,
    count: usize,
) -> Result<Vec<Vertex>, PlyError> {
    let num_properties = layout.properties().len();
    let mut values = Vec::with_capacity(num_properties);
    let mut vertices = Vec::with_capacity(count.min(MAX_PREALLOCATED_VERTICES));
    let mut line = String::new();

    while vertices.len() < count {
        let index = vertices.len();
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(PlyError::MalformedVertex {
                index,
                reason: format!("file ends before the {count} declared vertices"),
            });
        }
        if line.trim().is_empty() {
            continue;
        }

        values.clear();
        for token in line.split_whitespace().take(num_properties) {
            let value = token.parse::<f64>().map_err(|_| PlyError::MalformedVertex {
                index,
                reason: format!("'{token}' is not a number"),
            })?;
            values.push(value);
        }
        if values.len() < num_properties {
            return Err(PlyError::MalformedVertex {
                index,
                reason: format!("expected {num_properties} values, found {}", values.len()),
            });
        }
        vertices.push(layout.split(&values));
    }

    Ok(vertices)
}
