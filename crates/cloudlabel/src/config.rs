use std::path::{Path, PathBuf};

use cloudlabel_3d::{
    camera::{CameraError, CameraExtrinsic, CameraIntrinsic, CameraModel, Distortion},
    projection::{PaintOrder, ProjectorConfig},
    recolor::{RecolorConfig, DEFAULT_TOLERANCE},
    transforms::{axis_angle_to_rotation_matrix, TransformError},
};
use cloudlabel_image::ImageSize;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Error types for the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// The configuration file.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`PipelineConfig`].
    #[error("failed to parse config {path}: {source}")]
    Json {
        /// The configuration file.
        path: PathBuf,
        /// The underlying error.
        source: serde_json::Error,
    },

    /// The camera parameters are not usable.
    #[error(transparent)]
    Camera(#[from] CameraError),

    /// The axis-angle rotation is not usable.
    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// A rotation of `angle` radians about `axis`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisAngle {
    /// The rotation axis, normalized on use.
    pub axis: [f64; 3],
    /// The rotation angle in radians.
    pub angle: f64,
}

/// Camera parameters as matrices, the way calibration tools export them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// The 3x3 intrinsic matrix `K`.
    pub intrinsic: [[f64; 3]; 3],
    /// The distortion coefficients `[k1, k2, p1, p2, k3]`.
    pub distortion: [f64; 5],
    /// Rotation from the point cloud frame to the camera frame.
    pub rotation: [[f64; 3]; 3],
    /// Translation from the point cloud frame to the camera frame.
    pub translation: [f64; 3],
    /// Rotation given as axis and angle, replaces `rotation` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis_angle: Option<AxisAngle>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let camera = CameraModel::default();
        Self {
            intrinsic: camera.intrinsic.to_matrix(),
            distortion: camera.distortion.coefficients(),
            rotation: camera.extrinsic.rotation,
            translation: camera.extrinsic.translation,
            axis_angle: None,
        }
    }
}

impl TryFrom<&CameraConfig> for CameraModel {
    type Error = ConfigError;

    fn try_from(config: &CameraConfig) -> Result<Self, Self::Error> {
        let rotation = match config.axis_angle {
            Some(AxisAngle { axis, angle }) => axis_angle_to_rotation_matrix(&axis, angle)?,
            None => config.rotation,
        };
        let intrinsic = CameraIntrinsic::from_matrix(&config.intrinsic)?;
        let distortion = Distortion::from_coefficients(config.distortion)?;
        let extrinsic = CameraExtrinsic::new(rotation, config.translation)?;
        Ok(CameraModel::with_distortion(intrinsic, distortion).with_extrinsic(extrinsic))
    }
}

/// Rendering options of the projection stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorOptions {
    /// Radius of the disc painted per point.
    pub point_radius: usize,
    /// How points sharing a pixel are resolved.
    pub paint_order: PaintOrder,
    /// Color of empty pixels.
    pub background: [u8; 3],
}

impl Default for ProjectorOptions {
    fn default() -> Self {
        let defaults = ProjectorConfig::default();
        Self {
            point_radius: defaults.point_radius,
            paint_order: defaults.paint_order,
            background: defaults.background,
        }
    }
}

/// Options of the recoloring stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecolorOptions {
    /// Maximum (exclusive) distance between a labeled point and its original point.
    pub tolerance: f64,
    /// Seed of the class color generator, random colors on every run when unset.
    pub seed: Option<u64>,
}

impl Default for RecolorOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            seed: None,
        }
    }
}

/// Configuration of the whole pipeline. Every field falls back to its default.
///
/// ```json
/// {
///     "image_size": { "width": 1920, "height": 1080 },
///     "projector": { "point_radius": 1, "paint_order": "nearest_depth" },
///     "recolor": { "tolerance": 0.01, "seed": 42 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// The camera used to render the point cloud.
    pub camera: CameraConfig,
    /// Size of the rendered image.
    pub image_size: ImageSize,
    /// Rendering options.
    pub projector: ProjectorOptions,
    /// Recoloring options.
    pub recolor: RecolorOptions,
}

impl PipelineConfig {
    /// Load the configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build and validate the camera model.
    pub fn camera_model(&self) -> Result<CameraModel, ConfigError> {
        CameraModel::try_from(&self.camera)
    }

    /// The rasterizer parameters.
    pub fn projector_config(&self) -> ProjectorConfig {
        ProjectorConfig {
            image_size: self.image_size,
            point_radius: self.projector.point_radius,
            paint_order: self.projector.paint_order,
            background: self.projector.background,
        }
    }

    /// The recoloring parameters.
    pub fn recolor_config(&self) -> RecolorConfig {
        RecolorConfig {
            tolerance: self.recolor.tolerance,
        }
    }

    /// The class color generator, seeded when a seed is configured.
    pub fn color_rng(&self) -> StdRng {
        match self.recolor.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}
