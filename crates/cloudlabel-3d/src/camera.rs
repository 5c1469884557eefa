//! Pinhole camera model with the OpenCV five coefficient lens distortion.
use cloudlabel_image::ImageSize;

use crate::linalg::{is_rotation_matrix, transform_point};

/// Error types for camera operations.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CameraError {
    /// Invalid camera intrinsics matrix
    #[error("Invalid camera intrinsics matrix: {0}")]
    InvalidIntrinsics(String),

    /// Invalid camera pose
    #[error("Invalid camera pose: {0}")]
    InvalidPose(String),

    /// Invalid distortion parameters
    #[error("Invalid distortion parameters: {0}")]
    InvalidDistortion(String),
}

/// Represents the intrinsic parameters of a pinhole camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsic {
    /// The focal length in the x direction
    pub fx: f64,
    /// The focal length in the y direction
    pub fy: f64,
    /// The x coordinate of the principal point
    pub cx: f64,
    /// The y coordinate of the principal point
    pub cy: f64,
    /// The axis skew, zero for most sensors
    pub skew: f64,
}

impl CameraIntrinsic {
    /// Create camera intrinsics from focal lengths and principal point.
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            skew: 0.0,
        }
    }

    /// Create camera intrinsics from a 3x3 intrinsics matrix.
    ///
    /// The matrix must have the form `[[fx, s, cx], [0, fy, cy], [0, 0, 1]]` with
    /// positive focal lengths.
    pub fn from_matrix(k: &[[f64; 3]; 3]) -> Result<Self, CameraError> {
        if k[1][0] != 0.0 || k[2] != [0.0, 0.0, 1.0] {
            return Err(CameraError::InvalidIntrinsics(format!(
                "expected form [[fx, s, cx], [0, fy, cy], [0, 0, 1]], got {k:?}"
            )));
        }
        if !k.iter().flatten().all(|v| v.is_finite()) {
            return Err(CameraError::InvalidIntrinsics(format!(
                "non-finite entries in {k:?}"
            )));
        }
        if k[0][0] <= 0.0 || k[1][1] <= 0.0 {
            return Err(CameraError::InvalidIntrinsics(format!(
                "focal lengths must be positive, got fx={} fy={}",
                k[0][0], k[1][1]
            )));
        }

        Ok(Self {
            fx: k[0][0],
            fy: k[1][1],
            cx: k[0][2],
            cy: k[1][2],
            skew: k[0][1],
        })
    }

    /// Convert to 3x3 intrinsics matrix.
    pub fn to_matrix(&self) -> [[f64; 3]; 3] {
        [
            [self.fx, self.skew, self.cx],
            [0.0, self.fy, self.cy],
            [0.0, 0.0, 1.0],
        ]
    }
}

/// Radial and tangential distortion using the Brown-Conrady model.
///
/// Coefficients follow the OpenCV ordering `(k1, k2, p1, p2, k3)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Distortion {
    /// The first radial distortion coefficient
    pub k1: f64,
    /// The second radial distortion coefficient
    pub k2: f64,
    /// The first tangential distortion coefficient
    pub p1: f64,
    /// The second tangential distortion coefficient
    pub p2: f64,
    /// The third radial distortion coefficient
    pub k3: f64,
}

impl Distortion {
    /// Create distortion parameters with all coefficients set to zero.
    pub fn none() -> Self {
        Self::default()
    }

    /// Create distortion parameters from the `[k1, k2, p1, p2, k3]` vector.
    pub fn from_coefficients(coefficients: [f64; 5]) -> Result<Self, CameraError> {
        if !coefficients.iter().all(|c| c.is_finite()) {
            return Err(CameraError::InvalidDistortion(format!(
                "non-finite coefficients {coefficients:?}"
            )));
        }
        let [k1, k2, p1, p2, k3] = coefficients;
        Ok(Self { k1, k2, p1, p2, k3 })
    }

    /// Get the coefficients as the `[k1, k2, p1, p2, k3]` vector.
    pub fn coefficients(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    /// Apply the distortion to normalized image coordinates.
    pub fn distort(&self, x: f64, y: f64) -> (f64, f64) {
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;

        // radial distortion
        let kr = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;

        // tangential distortion
        let xy2 = 2.0 * x * y;
        let xd = x * kr + self.p1 * xy2 + self.p2 * (r2 + 2.0 * x * x);
        let yd = y * kr + self.p1 * (r2 + 2.0 * y * y) + self.p2 * xy2;

        (xd, yd)
    }
}

/// Represents the extrinsic parameters of a pinhole camera.
///
/// Maps points from the point cloud frame into the camera frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraExtrinsic {
    /// The rotation matrix of the camera 3x3
    pub rotation: [[f64; 3]; 3],
    /// The translation vector of the camera 3x1
    pub translation: [f64; 3],
}

impl Default for CameraExtrinsic {
    fn default() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0; 3],
        }
    }
}

impl CameraExtrinsic {
    /// Create a pose, checking that the rotation is a proper rotation matrix.
    pub fn new(rotation: [[f64; 3]; 3], translation: [f64; 3]) -> Result<Self, CameraError> {
        if !is_rotation_matrix(&rotation, 1e-6) {
            return Err(CameraError::InvalidPose(format!(
                "{rotation:?} is not a rotation matrix"
            )));
        }
        if !translation.iter().all(|t| t.is_finite()) {
            return Err(CameraError::InvalidPose(format!(
                "non-finite translation {translation:?}"
            )));
        }
        Ok(Self {
            rotation,
            translation,
        })
    }
}

/// A complete camera model with intrinsics, distortion and pose.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraModel {
    /// Camera intrinsics
    pub intrinsic: CameraIntrinsic,
    /// Lens distortion
    pub distortion: Distortion,
    /// Camera pose, identity when the camera sits at the point cloud origin
    pub extrinsic: CameraExtrinsic,
}

impl Default for CameraModel {
    /// Left sensor of the stereo camera the pipeline was tuned with.
    fn default() -> Self {
        Self {
            intrinsic: CameraIntrinsic::new(1071.24, 1071.01, 1107.42, 621.326),
            distortion: Distortion {
                k1: -1.1838,
                k2: 2.3461,
                p1: 0.0001,
                p2: -0.0,
                k3: 0.1203,
            },
            extrinsic: CameraExtrinsic::default(),
        }
    }
}

impl CameraModel {
    /// Create a camera model without distortion at the origin.
    pub fn pinhole(intrinsic: CameraIntrinsic) -> Self {
        Self {
            intrinsic,
            distortion: Distortion::none(),
            extrinsic: CameraExtrinsic::default(),
        }
    }

    /// Create a camera model with distortion at the origin.
    pub fn with_distortion(intrinsic: CameraIntrinsic, distortion: Distortion) -> Self {
        Self {
            intrinsic,
            distortion,
            extrinsic: CameraExtrinsic::default(),
        }
    }

    /// Replace the camera pose.
    pub fn with_extrinsic(mut self, extrinsic: CameraExtrinsic) -> Self {
        self.extrinsic = extrinsic;
        self
    }

    /// Project a point to floating pixel coordinates, returning the depth in the camera frame.
    ///
    /// Returns `None` for points on or behind the image plane and for non-finite results.
    pub fn project_point_with_depth(&self, point: &[f64; 3]) -> Option<([f64; 2], f64)> {
        let [x, y, z] = transform_point(point, &self.extrinsic.rotation, &self.extrinsic.translation);
        if z.is_nan() || z <= 0.0 {
            return None;
        }

        let (xd, yd) = self.distortion.distort(x / z, y / z);
        let u = self.intrinsic.fx * xd + self.intrinsic.skew * yd + self.intrinsic.cx;
        let v = self.intrinsic.fy * yd + self.intrinsic.cy;

        (u.is_finite() && v.is_finite()).then_some(([u, v], z))
    }

    /// Project a point to floating pixel coordinates without bounds checking.
    pub fn project_point_subpixel(&self, point: &[f64; 3]) -> Option<[f64; 2]> {
        self.project_point_with_depth(point).map(|(uv, _)| uv)
    }

    /// Project a point to the integer pixel it falls on.
    ///
    /// The floating coordinates are truncated towards zero. Returns `None` when the
    /// pixel falls outside `[0, width) x [0, height)`.
    ///
    /// Example:
    ///
    /// ```
    /// use cloudlabel_3d::camera::{CameraIntrinsic, CameraModel};
    /// use cloudlabel_image::ImageSize;
    ///
    /// let camera = CameraModel::pinhole(CameraIntrinsic::new(500.0, 500.0, 960.0, 540.0));
    /// let size = ImageSize { width: 1920, height: 1080 };
    /// assert_eq!(camera.project_point(&[0.0, 0.0, 5.0], &size), Some([960, 540]));
    /// assert_eq!(camera.project_point(&[100.0, 0.0, 1.0], &size), None);
    /// ```
    pub fn project_point(&self, point: &[f64; 3], image_size: &ImageSize) -> Option<[i64; 2]> {
        self.project_pixel_with_depth(point, image_size)
            .map(|(pixel, _)| pixel)
    }

    /// Same as [`CameraModel::project_point`] but also returns the camera-frame depth.
    pub fn project_pixel_with_depth(
        &self,
        point: &[f64; 3],
        image_size: &ImageSize,
    ) -> Option<([i64; 2], f64)> {
        let ([u, v], depth) = self.project_point_with_depth(point)?;
        let (u, v) = (u.trunc(), v.trunc());
        // reject before the integer cast saturates
        if u < 0.0 || v < 0.0 || u >= image_size.width as f64 || v >= image_size.height as f64 {
            return None;
        }
        Some(([u as i64, v as i64], depth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FULL_HD: ImageSize = ImageSize {
        width: 1920,
        height: 1080,
    };

    #[test]
    fn test_camera_intrinsic_from_matrix() -> Result<(), CameraError> {
        let k = [[1000.0, 0.0, 640.0], [0.0, 900.0, 480.0], [0.0, 0.0, 1.0]];
        let intrinsic = CameraIntrinsic::from_matrix(&k)?;
        assert_eq!(intrinsic, CameraIntrinsic::new(1000.0, 900.0, 640.0, 480.0));
        assert_eq!(intrinsic.to_matrix(), k);
        Ok(())
    }

    #[test]
    fn test_camera_intrinsic_invalid() {
        let bad_row = [[1000.0, 0.0, 640.0], [0.0, 900.0, 480.0], [0.0, 1.0, 1.0]];
        assert!(CameraIntrinsic::from_matrix(&bad_row).is_err());

        let bad_focal = [[0.0, 0.0, 640.0], [0.0, 900.0, 480.0], [0.0, 0.0, 1.0]];
        assert!(CameraIntrinsic::from_matrix(&bad_focal).is_err());

        let nan = [[f64::NAN, 0.0, 640.0], [0.0, 900.0, 480.0], [0.0, 0.0, 1.0]];
        assert!(CameraIntrinsic::from_matrix(&nan).is_err());
    }

    #[test]
    fn test_distortion_coefficients() -> Result<(), CameraError> {
        let coefficients = [-1.1838, 2.3461, 0.0001, -0.0, 0.1203];
        let distortion = Distortion::from_coefficients(coefficients)?;
        assert_eq!(distortion.coefficients(), coefficients);
        assert_eq!(distortion, CameraModel::default().distortion);
        assert!(Distortion::from_coefficients([f64::INFINITY, 0.0, 0.0, 0.0, 0.0]).is_err());
        Ok(())
    }

    #[test]
    fn test_distort_point() {
        let distortion = Distortion {
            k1: 0.1,
            k2: 0.01,
            p1: 0.001,
            p2: 0.002,
            k3: 0.0001,
        };
        let (x, y) = (0.2, -0.1);
        let (xd, yd) = distortion.distort(x, y);

        let r2: f64 = 0.05;
        let kr = 1.0 + 0.1 * r2 + 0.01 * r2 * r2 + 0.0001 * r2 * r2 * r2;
        assert_relative_eq!(
            xd,
            x * kr + 2.0 * 0.001 * x * y + 0.002 * (r2 + 2.0 * x * x),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            yd,
            y * kr + 0.001 * (r2 + 2.0 * y * y) + 2.0 * 0.002 * x * y,
            epsilon = 1e-12
        );

        // the optical axis is never displaced
        assert_eq!(distortion.distort(0.0, 0.0), (0.0, 0.0));
    }

    #[test]
    fn test_project_point_center() {
        let camera = CameraModel::with_distortion(
            CameraIntrinsic::new(1071.24, 1071.01, 960.0, 540.0),
            CameraModel::default().distortion,
        );
        assert_eq!(
            camera.project_point(&[0.0, 0.0, 5.0], &FULL_HD),
            Some([960, 540])
        );
    }

    #[test]
    fn test_project_point_pinhole() {
        let camera = CameraModel::pinhole(CameraIntrinsic::new(100.0, 200.0, 10.0, 20.0));
        let uv = camera.project_point_subpixel(&[1.0, 2.0, 4.0]);
        assert_eq!(uv, Some([35.0, 120.0]));

        // truncated towards zero
        let camera = CameraModel::pinhole(CameraIntrinsic::new(1.0, 1.0, 0.0, 0.0));
        let size = ImageSize {
            width: 10,
            height: 10,
        };
        assert_eq!(camera.project_point(&[2.9, 3.99, 1.0], &size), Some([2, 3]));
        assert_eq!(camera.project_point(&[-0.5, 3.0, 1.0], &size), Some([0, 3]));
        assert_eq!(camera.project_point(&[-1.0, 3.0, 1.0], &size), None);
    }

    #[test]
    fn test_project_point_out_of_bounds() {
        let camera = CameraModel::pinhole(CameraIntrinsic::new(1024.0, 1024.0, 960.0, 540.0));
        assert_eq!(camera.project_point(&[10.0, 0.0, 1.0], &FULL_HD), None);
        assert_eq!(camera.project_point(&[0.0, 10.0, 1.0], &FULL_HD), None);
        // exactly at the width is outside
        assert_eq!(camera.project_point(&[0.9375, 0.0, 1.0], &FULL_HD), None);
        assert_eq!(
            camera.project_point(&[0.9365234375, 0.0, 1.0], &FULL_HD),
            Some([1919, 540])
        );
    }

    #[test]
    fn test_project_point_behind_camera() {
        let camera = CameraModel::pinhole(CameraIntrinsic::new(1000.0, 1000.0, 960.0, 540.0));
        assert_eq!(camera.project_point(&[0.0, 0.0, -5.0], &FULL_HD), None);
        assert_eq!(camera.project_point(&[0.0, 0.0, 0.0], &FULL_HD), None);
        assert_eq!(camera.project_point_subpixel(&[f64::NAN, 0.0, 1.0]), None);
    }

    #[test]
    fn test_project_point_with_pose() -> Result<(), Box<dyn std::error::Error>> {
        // half a turn around y, the point behind the origin becomes visible
        let rotation = [[-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, -1.0]];
        let camera = CameraModel::pinhole(CameraIntrinsic::new(1000.0, 1000.0, 960.0, 540.0))
            .with_extrinsic(CameraExtrinsic::new(rotation, [0.0, 0.0, 1.0])?);

        let (pixel, depth) = camera
            .project_pixel_with_depth(&[0.0, 0.0, -4.0], &FULL_HD)
            .ok_or("point should be visible")?;
        assert_eq!(pixel, [960, 540]);
        assert_eq!(depth, 5.0);
        Ok(())
    }

    #[test]
    fn test_extrinsic_validation() {
        let scaled = [[2.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert!(matches!(
            CameraExtrinsic::new(scaled, [0.0; 3]),
            Err(CameraError::InvalidPose(_))
        ));
        let identity = CameraExtrinsic::default().rotation;
        assert!(CameraExtrinsic::new(identity, [f64::NAN, 0.0, 0.0]).is_err());
    }
}
