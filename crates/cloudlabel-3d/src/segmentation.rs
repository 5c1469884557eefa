use crate::projection::Correspondence;

/// Error types for the segmentation module.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ClassifyError {
    /// None of the detections can be used for containment tests.
    #[error("No usable detections among {0} provided")]
    EmptyInput(usize),
}

/// Reason a detection cannot be used for containment tests.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MalformedDetection {
    /// The detection has no bounding box.
    #[error("detection has no bounding box")]
    MissingBoundingBox,

    /// The detection has no outline polygon.
    #[error("detection has no outline polygon")]
    MissingPolygon,

    /// The outline has fewer than three vertices.
    #[error("outline polygon has {0} vertices, at least 3 are required")]
    TooFewVertices(usize),

    /// A coordinate or size is NaN or infinite, or a size is negative.
    #[error("detection geometry is not finite or has negative size")]
    InvalidGeometry,
}

/// Axis-aligned box given by its center and size, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// The x coordinate of the center.
    pub cx: f64,
    /// The y coordinate of the center.
    pub cy: f64,
    /// The width of the box.
    pub width: f64,
    /// The height of the box.
    pub height: f64,
}

impl BoundingBox {
    /// The `(min_x, min_y, max_x, max_y)` corners of the box.
    pub fn corners(&self) -> (f64, f64, f64, f64) {
        (
            self.cx - self.width / 2.0,
            self.cy - self.height / 2.0,
            self.cx + self.width / 2.0,
            self.cy + self.height / 2.0,
        )
    }

    /// Check whether the point lies inside the box, borders included.
    #[inline]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let (min_x, min_y, max_x, max_y) = self.corners();
        min_x <= x && x <= max_x && min_y <= y && y <= max_y
    }

    fn is_valid(&self) -> bool {
        [self.cx, self.cy, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width >= 0.0
            && self.height >= 0.0
    }
}

/// A simple polygon given by its ordered vertices, implicitly closed.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    vertices: Vec<[f64; 2]>,
}

impl Polygon {
    /// Create a polygon from at least three finite vertices.
    pub fn new(vertices: Vec<[f64; 2]>) -> Result<Self, MalformedDetection> {
        if vertices.len() < 3 {
            return Err(MalformedDetection::TooFewVertices(vertices.len()));
        }
        if !vertices.iter().flatten().all(|v| v.is_finite()) {
            return Err(MalformedDetection::InvalidGeometry);
        }
        Ok(Self { vertices })
    }

    /// The vertices of the polygon.
    pub fn vertices(&self) -> &[[f64; 2]] {
        &self.vertices
    }

    fn edges(&self) -> impl Iterator<Item = (&[f64; 2], &[f64; 2])> {
        self.vertices
            .iter()
            .zip(self.vertices.iter().cycle().skip(1))
    }

    /// Area-weighted centroid, or the vertex mean for degenerate (zero area) outlines.
    pub fn centroid(&self) -> [f64; 2] {
        let (mut area2, mut cx, mut cy) = (0.0, 0.0, 0.0);
        for (a, b) in self.edges() {
            let cross = a[0] * b[1] - b[0] * a[1];
            area2 += cross;
            cx += (a[0] + b[0]) * cross;
            cy += (a[1] + b[1]) * cross;
        }
        if area2.abs() < f64::EPSILON {
            let n = self.vertices.len() as f64;
            let (sx, sy) = self
                .vertices
                .iter()
                .fold((0.0, 0.0), |(sx, sy), v| (sx + v[0], sy + v[1]));
            return [sx / n, sy / n];
        }
        [cx / (3.0 * area2), cy / (3.0 * area2)]
    }

    /// Point-in-polygon test with the even-odd rule.
    ///
    /// Points on an edge or a vertex are inside.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let mut inside = false;
        for (a, b) in self.edges() {
            if on_segment(a, b, x, y) {
                return true;
            }
            if (a[1] > y) != (b[1] > y) {
                let x_cross = a[0] + (y - a[1]) * (b[0] - a[0]) / (b[1] - a[1]);
                if x < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

// collinear with the edge and within its extent
fn on_segment(a: &[f64; 2], b: &[f64; 2], x: f64, y: f64) -> bool {
    let cross = (b[0] - a[0]) * (y - a[1]) - (b[1] - a[1]) * (x - a[0]);
    let scale = (b[0] - a[0]).abs().max((b[1] - a[1]).abs()).max(1.0);
    cross.abs() <= 1e-9 * scale
        && x >= a[0].min(b[0])
        && x <= a[0].max(b[0])
        && y >= a[1].min(b[1])
        && y <= a[1].max(b[1])
}

/// An object found by the external 2D detector.
///
/// Geometry is optional as it arrives; [`Detection::region`] validates it.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// The class label of the object.
    pub class_name: String,
    /// The bounding box of the object.
    pub bounding_box: Option<BoundingBox>,
    /// The outline of the object.
    pub polygon: Option<Vec<[f64; 2]>>,
}

impl Detection {
    /// Validate the geometry needed for containment tests.
    pub fn region(&self) -> Result<(BoundingBox, Polygon), MalformedDetection> {
        let bounding_box = self
            .bounding_box
            .ok_or(MalformedDetection::MissingBoundingBox)?;
        if !bounding_box.is_valid() {
            return Err(MalformedDetection::InvalidGeometry);
        }
        let vertices = self
            .polygon
            .as_ref()
            .ok_or(MalformedDetection::MissingPolygon)?;
        Ok((bounding_box, Polygon::new(vertices.clone())?))
    }
}

/// A correspondence found inside a detection, carrying the detection's class.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledPoint {
    /// The class label of the containing detection.
    pub class_name: String,
    /// The point in the point cloud frame.
    pub point_3d: [f64; 3],
    /// The pixel the point projects to.
    pub pixel: [i64; 2],
}

/// Label every correspondence that falls inside a detection's bounding box and outline.
///
/// Detections are processed independently and in order: a correspondence inside two
/// overlapping detections is emitted twice, first for the earlier detection. Malformed
/// detections are skipped with a warning.
///
/// # Arguments
///
/// * `correspondences` - The 3D to 2D correspondences of the rendered image.
/// * `detections` - The detections found on the rendered image.
///
/// # Errors
///
/// Returns [`ClassifyError::EmptyInput`] if no detection is usable.
pub fn classify(
    correspondences: &[Correspondence],
    detections: &[Detection],
) -> Result<Vec<LabeledPoint>, ClassifyError> {
    let mut labeled = Vec::new();
    let mut num_usable = 0;

    for (i, detection) in detections.iter().enumerate() {
        let (bounding_box, polygon) = match detection.region() {
            Ok(region) => region,
            Err(reason) => {
                log::warn!(
                    "skipping detection #{i} of class '{}': {reason}",
                    detection.class_name
                );
                continue;
            }
        };
        num_usable += 1;

        let mut num_candidates = 0;
        let num_before = labeled.len();
        for correspondence in correspondences {
            let (x, y) = (
                correspondence.pixel[0] as f64,
                correspondence.pixel[1] as f64,
            );
            // cheap rejection before the exact test
            if !bounding_box.contains(x, y) {
                continue;
            }
            num_candidates += 1;
            if polygon.contains(x, y) {
                labeled.push(LabeledPoint {
                    class_name: detection.class_name.clone(),
                    point_3d: correspondence.point_3d,
                    pixel: correspondence.pixel,
                });
            }
        }

        log::debug!(
            "detection #{i} '{}': {num_candidates} points in box, {} inside outline",
            detection.class_name,
            labeled.len() - num_before
        );
    }

    if num_usable == 0 {
        return Err(ClassifyError::EmptyInput(detections.len()));
    }

    Ok(labeled)
}
