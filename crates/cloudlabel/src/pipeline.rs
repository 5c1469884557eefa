use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Instant;

use cloudlabel_3d::{
    io::{
        ply::{read_ply, write_ply_binary, PlyError},
        records::{self, RecordsError},
    },
    projection::{self, Projection, ProjectionError},
    recolor::{self, RecolorError, Recoloring},
    segmentation::{self, ClassifyError, LabeledPoint},
};
use cloudlabel_image::draw::{draw_polyline, draw_rect};
use cloudlabel_io::{
    error::IoError,
    png::{read_image_png_rgb8, write_image_png_rgb8},
};

use crate::config::{ConfigError, PipelineConfig};

/// Color of the detection boxes drawn by [`annotate_detections`].
pub const BOX_COLOR: [u8; 3] = [0, 255, 0];

/// Color of the detection outlines drawn by [`annotate_detections`].
pub const POLYGON_COLOR: [u8; 3] = [0, 0, 255];

/// Error types for the pipeline stages.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failed to read or write a point cloud.
    #[error("point cloud {path}: {source}")]
    Ply {
        /// The offending file.
        path: PathBuf,
        /// The underlying error.
        source: PlyError,
    },

    /// Failed to read or write an image.
    #[error(transparent)]
    Image(#[from] IoError),

    /// Failed to read or write a JSON record file.
    #[error(transparent)]
    Records(#[from] RecordsError),

    /// The projection stage failed.
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    /// The classification stage failed.
    #[error(transparent)]
    Classify(#[from] ClassifyError),

    /// The recoloring stage failed.
    #[error(transparent)]
    Recolor(#[from] RecolorError),

    /// A finished output could not be moved to its destination.
    #[error("failed to move output into place at {path}: {source}")]
    Commit {
        /// The destination of the output.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
}

fn ply_error(path: &Path) -> impl FnOnce(PlyError) -> PipelineError + '_ {
    move |source| PipelineError::Ply {
        path: path.to_path_buf(),
        source,
    }
}

// outputs are written next to their destination under this name, then renamed into place
fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".partial-");
    name.push(path.file_name().unwrap_or_default());
    path.with_file_name(name)
}

fn discard_staged(outputs: &[(PathBuf, &Path)]) {
    for (staged, _) in outputs {
        // not every staged file exists when a write failed midway
        let _ = std::fs::remove_file(staged);
    }
}

// Run `write` against the staged paths, then move every output into place.
// On failure no output of the stage is left at its destination.
fn write_outputs(
    outputs: &[(PathBuf, &Path)],
    write: impl FnOnce() -> Result<(), PipelineError>,
) -> Result<(), PipelineError> {
    if let Err(err) = write() {
        discard_staged(outputs);
        return Err(err);
    }

    for (i, (staged, destination)) in outputs.iter().enumerate() {
        if let Err(source) = std::fs::rename(staged, destination) {
            for (_, moved) in &outputs[..i] {
                if let Err(err) = std::fs::remove_file(moved) {
                    log::warn!("could not remove {}: {err}", moved.display());
                }
            }
            discard_staged(&outputs[i..]);
            return Err(PipelineError::Commit {
                path: destination.to_path_buf(),
                source,
            });
        }
    }
    Ok(())
}

/// Render a point cloud file into a PNG image and a correspondence table.
///
/// Both outputs are written or neither is, nothing is written if the cloud cannot be
/// projected.
pub fn project_cloud(
    cloud_path: impl AsRef<Path>,
    config: &PipelineConfig,
    image_path: impl AsRef<Path>,
    correspondences_path: impl AsRef<Path>,
) -> Result<Projection, PipelineError> {
    let cloud_path = cloud_path.as_ref();
    let camera = config.camera_model()?;
    let cloud = read_ply(cloud_path).map_err(ply_error(cloud_path))?;

    let start = Instant::now();
    let projection = projection::project(&cloud, &camera, &config.projector_config())?;
    log::debug!("projection took {:?}", start.elapsed());

    let image_path = image_path.as_ref();
    let correspondences_path = correspondences_path.as_ref();
    let outputs = [
        (staging_path(image_path), image_path),
        (staging_path(correspondences_path), correspondences_path),
    ];
    write_outputs(&outputs, || {
        write_image_png_rgb8(&outputs[0].0, &projection.image)?;
        records::write_correspondences(&outputs[1].0, &projection.correspondences)?;
        Ok(())
    })?;

    log::info!(
        "projected {} of {} points to {}",
        projection.correspondences.len(),
        cloud.len(),
        image_path.display()
    );
    Ok(projection)
}

/// Label the correspondences falling inside the detections of the rendered image.
pub fn classify_correspondences(
    correspondences_path: impl AsRef<Path>,
    detections_path: impl AsRef<Path>,
    labeled_path: impl AsRef<Path>,
) -> Result<Vec<LabeledPoint>, PipelineError> {
    let correspondences = records::read_correspondences(correspondences_path)?;
    let detections = records::read_detections(detections_path)?;

    let start = Instant::now();
    let labeled = segmentation::classify(&correspondences, &detections)?;
    log::debug!("classification took {:?}", start.elapsed());

    records::write_labeled_points(labeled_path.as_ref(), &labeled)?;

    log::info!(
        "labeled {} of {} correspondences with {} detections",
        labeled.len(),
        correspondences.len(),
        detections.len()
    );
    Ok(labeled)
}

/// Paint the labeled points onto the original point cloud and write the class legend.
///
/// Both outputs are written or neither is.
pub fn recolor_cloud(
    cloud_path: impl AsRef<Path>,
    labeled_path: impl AsRef<Path>,
    config: &PipelineConfig,
    output_cloud_path: impl AsRef<Path>,
    legend_path: impl AsRef<Path>,
) -> Result<Recoloring, PipelineError> {
    let (cloud_path, output_cloud_path) = (cloud_path.as_ref(), output_cloud_path.as_ref());
    let cloud = read_ply(cloud_path).map_err(ply_error(cloud_path))?;
    let labeled = records::read_labeled_points(labeled_path)?;

    let start = Instant::now();
    let mut rng = config.color_rng();
    let recoloring = recolor::recolor(&cloud, &labeled, &config.recolor_config(), &mut rng)?;
    log::debug!("recoloring took {:?}", start.elapsed());

    let legend_path = legend_path.as_ref();
    let outputs = [
        (staging_path(output_cloud_path), output_cloud_path),
        (staging_path(legend_path), legend_path),
    ];
    write_outputs(&outputs, || {
        let staged_cloud = &outputs[0].0;
        write_ply_binary(staged_cloud, &recoloring.cloud).map_err(ply_error(staged_cloud))?;
        records::write_class_colors(&outputs[1].0, &recoloring.class_colors)?;
        Ok(())
    })?;

    log::info!(
        "recolored {} points in {} classes ({} labels beyond tolerance) to {}",
        recoloring.matched,
        recoloring.class_colors.len(),
        recoloring.discarded,
        output_cloud_path.display()
    );
    Ok(recoloring)
}

/// Draw the detection boxes and outlines over the rendered image for review.
///
/// Detections that classification would skip are skipped here too, with a warning.
pub fn annotate_detections(
    image_path: impl AsRef<Path>,
    detections_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> Result<(), PipelineError> {
    let mut image = read_image_png_rgb8(image_path)?;
    let detections = records::read_detections(detections_path)?;

    let mut drawn = 0;
    for (i, detection) in detections.iter().enumerate() {
        let (bounding_box, polygon) = match detection.region() {
            Ok(region) => region,
            Err(reason) => {
                log::warn!(
                    "not drawing detection #{i} of class '{}': {reason}",
                    detection.class_name
                );
                continue;
            }
        };

        // float to int casts saturate, drawing clips to the image
        let (min_x, min_y, max_x, max_y) = bounding_box.corners();
        draw_rect(
            &mut image,
            (min_x.round() as i64, min_y.round() as i64),
            (max_x.round() as i64, max_y.round() as i64),
            BOX_COLOR,
            2,
        );
        let vertices = polygon
            .vertices()
            .iter()
            .map(|&[x, y]| (x.round() as i64, y.round() as i64))
            .collect::<Vec<_>>();
        draw_polyline(&mut image, &vertices, POLYGON_COLOR, 2);
        drawn += 1;
    }

    write_image_png_rgb8(output_path.as_ref(), &image)?;
    log::info!(
        "drew {drawn} of {} detections to {}",
        detections.len(),
        output_path.as_ref().display()
    );
    Ok(())
}

/// Files exchanged between the pipeline stages.
#[derive(Debug, Clone)]
pub struct StagePaths {
    /// The input point cloud.
    pub cloud: PathBuf,
    /// The rendered image handed to the detector.
    pub image: PathBuf,
    /// The 3D to 2D correspondence table.
    pub correspondences: PathBuf,
    /// The detector output.
    pub detections: PathBuf,
    /// The labeled points.
    pub labeled: PathBuf,
    /// The recolored point cloud.
    pub output_cloud: PathBuf,
    /// The class color legend.
    pub legend: PathBuf,
}

impl StagePaths {
    /// Default file names inside `dir`, reading the cloud from `cloud`.
    pub fn in_dir(cloud: impl Into<PathBuf>, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            cloud: cloud.into(),
            image: dir.join("projection.png"),
            correspondences: dir.join("correspondences.json"),
            detections: dir.join("detections.json"),
            labeled: dir.join("labeled_points.json"),
            output_cloud: dir.join("labeled_cloud.ply"),
            legend: dir.join("class_colors.json"),
        }
    }
}

/// Run the stages that have their inputs available.
///
/// The projection runs when its outputs are missing. Classification and recoloring run
/// once the detector output exists; until then `Ok(None)` is returned so the rendered
/// image can be sent to the detector.
pub fn run_stages(
    paths: &StagePaths,
    config: &PipelineConfig,
) -> Result<Option<Recoloring>, PipelineError> {
    if paths.image.exists() && paths.correspondences.exists() {
        log::info!(
            "reusing projection {} and {}",
            paths.image.display(),
            paths.correspondences.display()
        );
    } else {
        project_cloud(&paths.cloud, config, &paths.image, &paths.correspondences)?;
    }

    if !paths.detections.exists() {
        log::info!(
            "no detections at {}, run the detector on {} and start again",
            paths.detections.display(),
            paths.image.display()
        );
        return Ok(None);
    }

    classify_correspondences(&paths.correspondences, &paths.detections, &paths.labeled)?;
    let recoloring = recolor_cloud(
        &paths.cloud,
        &paths.labeled,
        config,
        &paths.output_cloud,
        &paths.legend,
    )?;
    Ok(Some(recoloring))
}
