use cloudlabel_image::{
    draw::{disc_pixels, draw_filled_circle},
    Image, ImageError, ImageSize,
};
use rayon::prelude::*;

use crate::{camera::CameraModel, pointcloud::PointCloud};

/// Color given to points of a cloud without colors.
pub const FALLBACK_COLOR: [f64; 3] = [1.0, 1.0, 1.0];

/// Error types for the projection module.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    /// The point cloud has no points.
    #[error("Cannot project an empty point cloud")]
    EmptyInput,

    /// Failed to allocate the output image.
    #[error("Failed to create the projection image. {0}")]
    Image(#[from] ImageError),
}

/// How overlapping points resolve the color of a shared pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaintOrder {
    /// Points are painted in cloud order and the highest index wins. No occlusion handling.
    #[default]
    LastWins,
    /// Z-buffered: the point closest to the camera wins, ties go to the highest index.
    NearestDepth,
}

/// Parameters of the point cloud rasterizer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ProjectorConfig {
    /// Size of the rendered image.
    pub image_size: ImageSize,
    /// Radius of the disc painted for each point, zero paints a single pixel.
    pub point_radius: usize,
    /// Tie-break for pixels shared by several points.
    pub paint_order: PaintOrder,
    /// Color of pixels no point projects to.
    pub background: [u8; 3],
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            image_size: ImageSize::default(),
            point_radius: 0,
            paint_order: PaintOrder::default(),
            background: [0, 0, 0],
        }
    }
}

/// A 3D point linked to the pixel it projects to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    /// The point in the point cloud frame.
    pub point_3d: [f64; 3],
    /// The pixel `(x, y)` inside the rendered image.
    pub pixel: [i64; 2],
}

/// Output of [`project`].
#[derive(Debug, Clone)]
pub struct Projection {
    /// The rendered RGB image.
    pub image: Image<u8, 3>,
    /// One correspondence per point landing inside the image, in cloud order.
    pub correspondences: Vec<Correspondence>,
}

/// Convert a 0-1 color to 8 bits, truncating like the reference renderer.
#[inline]
pub fn color_to_rgb8(color: &[f64; 3]) -> [u8; 3] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0) as u8)
}

/// Render a point cloud into an image and collect the 3D to 2D correspondences.
///
/// Points projecting outside the image (or behind the camera) are skipped silently. The
/// per-point projection runs in parallel but painting follows the cloud order, so the
/// output is identical between runs.
///
/// # Arguments
///
/// * `cloud` - The point cloud to render. Points without colors are painted white.
/// * `camera` - The camera model used to project the points.
/// * `config` - The image size and painting options.
///
/// # Errors
///
/// Returns [`ProjectionError::EmptyInput`] if the cloud has no points.
pub fn project(
    cloud: &PointCloud,
    camera: &CameraModel,
    config: &ProjectorConfig,
) -> Result<Projection, ProjectionError> {
    if cloud.is_empty() {
        return Err(ProjectionError::EmptyInput);
    }

    let fallback_colors;
    let colors = match cloud.colors() {
        Some(colors) => colors,
        None => {
            log::warn!(
                "point cloud has no colors, painting {} points white",
                cloud.len()
            );
            fallback_colors = vec![FALLBACK_COLOR; cloud.len()];
            &fallback_colors[..]
        }
    };

    let image_size = config.image_size;
    let mut image = Image::<u8, 3>::from_size_pixel(image_size, config.background)?;

    // NOTE: collect keeps the cloud order, painting below is sequential
    let hits = cloud
        .points()
        .par_iter()
        .map(|point| camera.project_pixel_with_depth(point, &image_size))
        .collect::<Vec<_>>();

    let mut correspondences = Vec::with_capacity(hits.iter().flatten().count());
    let mut depth_buffer = match config.paint_order {
        PaintOrder::LastWins => None,
        PaintOrder::NearestDepth => Some(vec![f64::INFINITY; image_size.width * image_size.height]),
    };

    for ((point, color), hit) in cloud.points().iter().zip(colors).zip(&hits) {
        let Some((pixel, depth)) = hit else {
            continue;
        };
        let rgb = color_to_rgb8(color);
        let center = (pixel[0], pixel[1]);

        match depth_buffer.as_mut() {
            None => draw_filled_circle(&mut image, center, config.point_radius, rgb),
            Some(depth_buffer) => paint_depth_tested(
                &mut image,
                depth_buffer,
                center,
                config.point_radius,
                *depth,
                rgb,
            ),
        }

        correspondences.push(Correspondence {
            point_3d: *point,
            pixel: *pixel,
        });
    }

    log::debug!(
        "projected {}/{} points into a {} image",
        correspondences.len(),
        cloud.len(),
        image_size
    );

    Ok(Projection {
        image,
        correspondences,
    })
}

// paint a disc keeping, per pixel, the closest depth seen so far
fn paint_depth_tested(
    image: &mut Image<u8, 3>,
    depth_buffer: &mut [f64],
    center: (i64, i64),
    radius: usize,
    depth: f64,
    rgb: [u8; 3],
) {
    let size = image.size();
    for (x, y) in disc_pixels(size, center, radius) {
        let idx = y * size.width + x;
        // equal depth goes to the later point, matching the last-wins order
        if depth <= depth_buffer[idx] {
            depth_buffer[idx] = depth;
            let start = idx * 3;
            image.as_slice_mut()[start..start + 3].copy_from_slice(&rgb);
        }
    }
}
