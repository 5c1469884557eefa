/// Error types for the point cloud container.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PointCloudError {
    /// An attribute does not have one entry per point.
    #[error("Number of {attribute} ({actual}) does not match number of points ({expected})")]
    LengthMismatch {
        /// Name of the offending attribute.
        attribute: &'static str,
        /// Number of points in the cloud.
        expected: usize,
        /// Number of attribute entries provided.
        actual: usize,
    },
}

/// A point cloud with points, colors and normals.
///
/// Colors are RGB triplets on a 0-1 scale. Point coordinates are fixed once the cloud is
/// created; only the colors may be rewritten.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    // The points in the point cloud.
    points: Vec<[f64; 3]>,
    // The colors of the points.
    colors: Option<Vec<[f64; 3]>>,
    // The normals of the points.
    normals: Option<Vec<[f64; 3]>>,
}

impl PointCloud {
    /// Create a new point cloud from points, colors (optional), and normals (optional).
    ///
    /// # Errors
    ///
    /// Returns [`PointCloudError::LengthMismatch`] if colors or normals are not paired
    /// index-for-index with the points.
    pub fn new(
        points: Vec<[f64; 3]>,
        colors: Option<Vec<[f64; 3]>>,
        normals: Option<Vec<[f64; 3]>>,
    ) -> Result<Self, PointCloudError> {
        let check = |attribute: &'static str, values: &Option<Vec<[f64; 3]>>| match values {
            Some(values) if values.len() != points.len() => Err(PointCloudError::LengthMismatch {
                attribute,
                expected: points.len(),
                actual: values.len(),
            }),
            _ => Ok(()),
        };
        check("colors", &colors)?;
        check("normals", &normals)?;

        Ok(Self {
            points,
            colors,
            normals,
        })
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Get as reference the colors of the points in the point cloud.
    pub fn colors(&self) -> Option<&[[f64; 3]]> {
        self.colors.as_deref()
    }

    /// Get as reference the normals of the points in the point cloud.
    pub fn normals(&self) -> Option<&[[f64; 3]]> {
        self.normals.as_deref()
    }

    /// Get the colors mutably, filling every point with `fill` first if the cloud has none.
    pub fn colors_mut_or_fill(&mut self, fill: [f64; 3]) -> &mut [[f64; 3]] {
        let len = self.points.len();
        self.colors.get_or_insert_with(|| vec![fill; len])
    }

    /// Get the axis-aligned bounds `(min, max)` of the point cloud, `None` if empty.
    pub fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold((first, first), |(mut lo, mut hi), p| {
            for i in 0..3 {
                lo[i] = lo[i].min(p[i]);
                hi[i] = hi[i].max(p[i]);
            }
            (lo, hi)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointcloud() -> Result<(), PointCloudError> {
        let pointcloud = PointCloud::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
            Some(vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]),
            Some(vec![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0]]),
        )?;

        assert_eq!(pointcloud.len(), 2);
        assert!(!pointcloud.is_empty());
        assert_eq!(pointcloud.points()[1], [1.0, 0.0, 0.0]);
        assert_eq!(pointcloud.colors().map(|c| c.len()), Some(2));
        assert_eq!(pointcloud.normals().map(|n| n.len()), Some(2));
        Ok(())
    }

    #[test]
    fn test_pointcloud_length_mismatch() {
        let result = PointCloud::new(vec![[0.0; 3]; 3], Some(vec![[1.0; 3]; 2]), None);
        assert_eq!(
            result,
            Err(PointCloudError::LengthMismatch {
                attribute: "colors",
                expected: 3,
                actual: 2,
            })
        );
    }

    #[test]
    fn test_colors_fill() -> Result<(), PointCloudError> {
        let mut pointcloud = PointCloud::new(vec![[0.0; 3]; 2], None, None)?;
        assert!(pointcloud.colors().is_none());

        pointcloud.colors_mut_or_fill([1.0; 3])[0] = [0.5, 0.5, 0.5];
        assert_eq!(
            pointcloud.colors(),
            Some(&[[0.5, 0.5, 0.5], [1.0, 1.0, 1.0]][..])
        );

        // existing colors are kept
        pointcloud.colors_mut_or_fill([0.0; 3]);
        assert_eq!(pointcloud.colors().map(|c| c[1]), Some([1.0, 1.0, 1.0]));
        Ok(())
    }

    #[test]
    fn test_bounds() -> Result<(), PointCloudError> {
        let pointcloud = PointCloud::new(
            vec![[0.0, 2.0, -1.0], [1.0, -3.0, 0.5], [0.5, 0.0, 4.0]],
            None,
            None,
        )?;
        assert_eq!(
            pointcloud.bounds(),
            Some(([0.0, -3.0, -1.0], [1.0, 2.0, 4.0]))
        );
        assert_eq!(PointCloud::new(vec![], None, None)?.bounds(), None);
        Ok(())
    }
}
