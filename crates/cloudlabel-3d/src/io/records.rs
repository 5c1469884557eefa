use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};

use crate::{
    projection::Correspondence,
    recolor::ClassColors,
    segmentation::{BoundingBox, Detection, LabeledPoint},
};

/// Error types for the JSON records.
#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    /// Failed to open or write the file.
    #[error("failed to access {path}: {source}")]
    Io {
        /// The offending file.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The file content does not match the expected layout.
    #[error("failed to (de)serialize {path}: {source}")]
    Json {
        /// The offending file.
        path: PathBuf,
        /// The underlying error.
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Point3dRecord {
    x: f64,
    y: f64,
    z: f64,
}

impl From<[f64; 3]> for Point3dRecord {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<Point3dRecord> for [f64; 3] {
    fn from(p: Point3dRecord) -> Self {
        [p.x, p.y, p.z]
    }
}

// written as integers, read from any number and truncated
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct PixelRecord {
    #[serde(deserialize_with = "truncated")]
    x: i64,
    #[serde(deserialize_with = "truncated")]
    y: i64,
}

fn truncated<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() {
        return Err(serde::de::Error::custom("pixel coordinate is not finite"));
    }
    Ok(value as i64)
}

impl From<[i64; 2]> for PixelRecord {
    fn from([x, y]: [i64; 2]) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CorrespondenceRecord {
    #[serde(rename = "point_3D")]
    point_3d: Point3dRecord,
    #[serde(rename = "point_2D")]
    point_2d: PixelRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LabeledPointRecord {
    class: String,
    #[serde(rename = "point_3D")]
    point_3d: Point3dRecord,
    #[serde(rename = "point_2D")]
    point_2d: PixelRecord,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct BoundingBoxRecord {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct VertexRecord {
    x: f64,
    y: f64,
}

// extra detector fields such as `confidence` are ignored
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DetectionRecord {
    class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bounding_box: Option<BoundingBoxRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    points: Option<Vec<VertexRecord>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ColorRecord {
    r: f64,
    g: f64,
    b: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ClassColorRecord {
    color: ColorRecord,
}

impl From<&Correspondence> for CorrespondenceRecord {
    fn from(c: &Correspondence) -> Self {
        Self {
            point_3d: c.point_3d.into(),
            point_2d: c.pixel.into(),
        }
    }
}

impl From<CorrespondenceRecord> for Correspondence {
    fn from(r: CorrespondenceRecord) -> Self {
        Self {
            point_3d: r.point_3d.into(),
            pixel: [r.point_2d.x, r.point_2d.y],
        }
    }
}

impl From<&LabeledPoint> for LabeledPointRecord {
    fn from(l: &LabeledPoint) -> Self {
        Self {
            class: l.class_name.clone(),
            point_3d: l.point_3d.into(),
            point_2d: l.pixel.into(),
        }
    }
}

impl From<LabeledPointRecord> for LabeledPoint {
    fn from(r: LabeledPointRecord) -> Self {
        Self {
            class_name: r.class,
            point_3d: r.point_3d.into(),
            pixel: [r.point_2d.x, r.point_2d.y],
        }
    }
}

impl From<&Detection> for DetectionRecord {
    fn from(d: &Detection) -> Self {
        Self {
            class: d.class_name.clone(),
            bounding_box: d.bounding_box.map(|b| BoundingBoxRecord {
                x: b.cx,
                y: b.cy,
                width: b.width,
                height: b.height,
            }),
            points: d
                .polygon
                .as_ref()
                .map(|p| p.iter().map(|&[x, y]| VertexRecord { x, y }).collect()),
        }
    }
}

impl From<DetectionRecord> for Detection {
    fn from(r: DetectionRecord) -> Self {
        Self {
            class_name: r.class,
            bounding_box: r.bounding_box.map(|b| BoundingBox {
                cx: b.x,
                cy: b.y,
                width: b.width,
                height: b.height,
            }),
            polygon: r
                .points
                .map(|p| p.into_iter().map(|v| [v.x, v.y]).collect()),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, RecordsError> {
    let file = File::open(path).map_err(|source| RecordsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| RecordsError::Json {
        path: path.to_path_buf(),
        source,
    })
}

// pretty printed with a four space indent
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), RecordsError> {
    let io_error = |source| RecordsError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_error)?;
    let mut writer = BufWriter::new(file);

    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|source| RecordsError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    writer.flush().map_err(io_error)
}

/// Read the 3D to 2D correspondence table.
pub fn read_correspondences(path: impl AsRef<Path>) -> Result<Vec<Correspondence>, RecordsError> {
    let records: Vec<CorrespondenceRecord> = read_json(path.as_ref())?;
    Ok(records.into_iter().map(Into::into).collect())
}

/// Write the 3D to 2D correspondence table.
pub fn write_correspondences(
    path: impl AsRef<Path>,
    correspondences: &[Correspondence],
) -> Result<(), RecordsError> {
    let records = correspondences
        .iter()
        .map(CorrespondenceRecord::from)
        .collect::<Vec<_>>();
    write_json(path.as_ref(), &records)
}

/// Read the detections produced by the external 2D detector.
///
/// Detections without `bounding_box` or `points` are kept; the classifier skips them.
pub fn read_detections(path: impl AsRef<Path>) -> Result<Vec<Detection>, RecordsError> {
    let records: Vec<DetectionRecord> = read_json(path.as_ref())?;
    Ok(records.into_iter().map(Into::into).collect())
}

/// Write detections in the detector output layout.
pub fn write_detections(
    path: impl AsRef<Path>,
    detections: &[Detection],
) -> Result<(), RecordsError> {
    let records = detections
        .iter()
        .map(DetectionRecord::from)
        .collect::<Vec<_>>();
    write_json(path.as_ref(), &records)
}

/// Read labeled points.
pub fn read_labeled_points(path: impl AsRef<Path>) -> Result<Vec<LabeledPoint>, RecordsError> {
    let records: Vec<LabeledPointRecord> = read_json(path.as_ref())?;
    Ok(records.into_iter().map(Into::into).collect())
}

/// Write labeled points.
pub fn write_labeled_points(
    path: impl AsRef<Path>,
    labeled: &[LabeledPoint],
) -> Result<(), RecordsError> {
    let records = labeled
        .iter()
        .map(LabeledPointRecord::from)
        .collect::<Vec<_>>();
    write_json(path.as_ref(), &records)
}

/// Read a class color legend.
pub fn read_class_colors(path: impl AsRef<Path>) -> Result<ClassColors, RecordsError> {
    let records: std::collections::BTreeMap<String, ClassColorRecord> =
        read_json(path.as_ref())?;
    Ok(records
        .into_iter()
        .map(|(class, record)| (class, [record.color.r, record.color.g, record.color.b]))
        .collect())
}

/// Write a class color legend as `{ "<class>": { "color": { "r", "g", "b" } } }`.
pub fn write_class_colors(
    path: impl AsRef<Path>,
    class_colors: &ClassColors,
) -> Result<(), RecordsError> {
    let records = class_colors
        .iter()
        .map(|(class, &[r, g, b])| {
            (
                class.as_str(),
                ClassColorRecord {
                    color: ColorRecord { r, g, b },
                },
            )
        })
        .collect::<std::collections::BTreeMap<_, _>>();
    write_json(path.as_ref(), &records)
}
