use std::collections::BTreeMap;

use kiddo::immutable::float::kdtree::ImmutableKdTree;
use rand::Rng;
use rayon::prelude::*;

use crate::{pointcloud::PointCloud, projection::FALLBACK_COLOR, segmentation::LabeledPoint};

/// Distance below which a labeled point is matched to an original point.
pub const DEFAULT_TOLERANCE: f64 = 0.01;

/// Class name to RGB color on a 0-1 scale, ordered by class name.
pub type ClassColors = BTreeMap<String, [f64; 3]>;

/// Error types for the recolor module.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RecolorError {
    /// The original point cloud has no points.
    #[error("Cannot recolor an empty point cloud")]
    EmptyInput,

    /// The match tolerance is not a positive finite distance.
    #[error("Invalid match tolerance {0}, expected a positive finite distance")]
    InvalidTolerance(f64),
}

/// Parameters of the nearest-neighbour recoloring.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RecolorConfig {
    /// Matches at this Euclidean distance or farther are discarded.
    pub tolerance: f64,
}

impl Default for RecolorConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// Output of [`recolor`].
#[derive(Debug, Clone)]
pub struct Recoloring {
    /// The original cloud with matched points painted in their class color.
    pub cloud: PointCloud,
    /// The color assigned to every class seen in the labeled points.
    pub class_colors: ClassColors,
    /// Number of labeled points matched to an original point.
    pub matched: usize,
    /// Number of labeled points with no original point within tolerance.
    pub discarded: usize,
}

/// Paint the class colors of labeled points back onto the original point cloud.
///
/// Every labeled point is matched to its nearest original point. Matches closer than the
/// tolerance (strictly) recolor that point; the rest are dropped and counted. Each class
/// draws its color from `rng` the first time it appears in `labeled`, so a seeded
/// generator makes the output reproducible. When several labels land on the same point
/// the last one in `labeled` wins.
///
/// The original cloud is left untouched when `labeled` is empty. Otherwise points of a
/// cloud without colors start out white.
///
/// # Errors
///
/// Returns [`RecolorError::EmptyInput`] if the cloud is empty, and
/// [`RecolorError::InvalidTolerance`] for a non-positive or non-finite tolerance.
pub fn recolor<R: Rng>(
    cloud: &PointCloud,
    labeled: &[LabeledPoint],
    config: &RecolorConfig,
    rng: &mut R,
) -> Result<Recoloring, RecolorError> {
    if cloud.is_empty() {
        return Err(RecolorError::EmptyInput);
    }
    if !(config.tolerance.is_finite() && config.tolerance > 0.0) {
        return Err(RecolorError::InvalidTolerance(config.tolerance));
    }

    let mut recolored = cloud.clone();
    if labeled.is_empty() {
        log::debug!("no labeled points, point cloud left unchanged");
        return Ok(Recoloring {
            cloud: recolored,
            class_colors: ClassColors::new(),
            matched: 0,
            discarded: 0,
        });
    }

    if cloud.colors().is_none() {
        log::warn!("point cloud has no colors, unmatched points stay white");
    }

    let kdtree: ImmutableKdTree<f64, u32, 3, 32> = ImmutableKdTree::new_from_slice(cloud.points());

    // compare squared distances to avoid a sqrt per query
    let max_distance_sq = config.tolerance * config.tolerance;
    let nearest = labeled
        .par_iter()
        .map(|label| {
            let nn = kdtree.nearest_one::<kiddo::SquaredEuclidean>(&label.point_3d);
            (nn.distance < max_distance_sq).then_some(nn.item as usize)
        })
        .collect::<Vec<_>>();

    let mut class_colors = ClassColors::new();
    let mut matched = 0;
    let colors = recolored.colors_mut_or_fill(FALLBACK_COLOR);

    for (label, nearest) in labeled.iter().zip(nearest) {
        // drawn on first sight even if the label is discarded, keeps the rng sequence
        // independent of the match outcome
        let color = *class_colors
            .entry(label.class_name.clone())
            .or_insert_with(|| [rng.random::<f64>(), rng.random::<f64>(), rng.random::<f64>()]);

        if let Some(idx) = nearest {
            colors[idx] = color;
            matched += 1;
        }
    }

    let discarded = labeled.len() - matched;
    log::debug!(
        "recolored {matched} labeled points over {} classes, discarded {discarded} beyond {}",
        class_colors.len(),
        config.tolerance
    );

    Ok(Recoloring {
        cloud: recolored,
        class_colors,
        matched,
        discarded,
    })
}
