use cloudlabel::{
    config::{CameraConfig, PipelineConfig, RecolorOptions},
    k3d::{
        io::{
            ply::{read_ply, write_ply_binary},
            records,
        },
        pointcloud::PointCloud,
        segmentation::{BoundingBox, Detection},
    },
    pipeline::{self, StagePaths},
};

fn test_config() -> PipelineConfig {
    PipelineConfig {
        camera: CameraConfig {
            intrinsic: [[500.0, 0.0, 960.0], [0.0, 500.0, 540.0], [0.0, 0.0, 1.0]],
            distortion: [0.0; 5],
            ..Default::default()
        },
        recolor: RecolorOptions {
            seed: Some(42),
            ..Default::default()
        },
        ..Default::default()
    }
}

// (960, 540), (1085, 602), behind the camera, (1210, 540)
fn test_cloud() -> Result<PointCloud, Box<dyn std::error::Error>> {
    Ok(PointCloud::new(
        vec![
            [0.0, 0.0, 5.0],
            [1.0, 0.5, 4.0],
            [0.0, 0.0, -1.0],
            [0.5, 0.0, 1.0],
        ],
        Some(vec![[0.5; 3]; 4]),
        None,
    )?)
}

fn square(class_name: &str, cx: f64, cy: f64, size: f64) -> Detection {
    let h = size / 2.0;
    Detection {
        class_name: class_name.to_string(),
        bounding_box: Some(BoundingBox {
            cx,
            cy,
            width: size,
            height: size,
        }),
        polygon: Some(vec![
            [cx - h, cy - h],
            [cx + h, cy - h],
            [cx + h, cy + h],
            [cx - h, cy + h],
        ]),
    }
}

fn quantized(color: [f64; 3]) -> [f64; 3] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() / 255.0)
}

#[test]
fn stages_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempfile::tempdir()?;
    let paths = StagePaths::in_dir(tmp_dir.path().join("cloud.ply"), tmp_dir.path());
    let config = test_config();
    write_ply_binary(&paths.cloud, &test_cloud()?)?;

    // projection
    let projection =
        pipeline::project_cloud(&paths.cloud, &config, &paths.image, &paths.correspondences)?;
    let pixels = projection
        .correspondences
        .iter()
        .map(|c| c.pixel)
        .collect::<Vec<_>>();
    assert_eq!(pixels, vec![[960, 540], [1085, 602], [1210, 540]]);
    assert_eq!(records::read_correspondences(&paths.correspondences)?, projection.correspondences);

    let image = cloudlabel::io::png::read_image_png_rgb8(&paths.image)?;
    assert_eq!(image, projection.image);
    assert_ne!(image.pixel(960, 540)?, [0, 0, 0]);
    assert_eq!(image.pixel(0, 0)?, [0, 0, 0]);

    // classification
    records::write_detections(
        &paths.detections,
        &[square("chair", 960.0, 540.0, 100.0), square("table", 1085.0, 602.0, 20.0)],
    )?;
    let labeled =
        pipeline::classify_correspondences(&paths.correspondences, &paths.detections, &paths.labeled)?;
    let classes = labeled
        .iter()
        .map(|l| (l.class_name.as_str(), l.point_3d))
        .collect::<Vec<_>>();
    assert_eq!(classes, vec![("chair", [0.0, 0.0, 5.0]), ("table", [1.0, 0.5, 4.0])]);

    // recoloring
    let recoloring = pipeline::recolor_cloud(
        &paths.cloud,
        &paths.labeled,
        &config,
        &paths.output_cloud,
        &paths.legend,
    )?;
    assert_eq!(recoloring.matched, 2);
    assert_eq!(recoloring.discarded, 0);

    let original = read_ply(&paths.cloud)?;
    let recolored = read_ply(&paths.output_cloud)?;
    assert_eq!(recolored.points(), original.points());

    let colors = recolored.colors().ok_or("recolored cloud has no colors")?;
    let original_colors = original.colors().ok_or("original cloud has no colors")?;
    assert_eq!(colors[0], quantized(recoloring.class_colors["chair"]));
    assert_eq!(colors[1], quantized(recoloring.class_colors["table"]));
    assert_eq!(colors[2], original_colors[2]);
    assert_eq!(colors[3], original_colors[3]);

    let legend = records::read_class_colors(&paths.legend)?;
    assert_eq!(legend.keys().collect::<Vec<_>>(), vec!["chair", "table"]);

    // overlay
    let overlay_path = tmp_dir.path().join("overlay.png");
    pipeline::annotate_detections(&paths.image, &paths.detections, &overlay_path)?;
    let overlay = cloudlabel::io::png::read_image_png_rgb8(&overlay_path)?;
    assert_eq!(overlay.pixel(910, 540)?, pipeline::POLYGON_COLOR);
    Ok(())
}

#[test]
fn projection_is_deterministic() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempfile::tempdir()?;
    let cloud_path = tmp_dir.path().join("cloud.ply");
    let config = test_config();
    write_ply_binary(&cloud_path, &test_cloud()?)?;

    let dir = tmp_dir.path();
    pipeline::project_cloud(&cloud_path, &config, dir.join("a.png"), dir.join("a.json"))?;
    pipeline::project_cloud(&cloud_path, &config, dir.join("b.png"), dir.join("b.json"))?;

    assert_eq!(std::fs::read(dir.join("a.png"))?, std::fs::read(dir.join("b.png"))?);
    assert_eq!(std::fs::read(dir.join("a.json"))?, std::fs::read(dir.join("b.json"))?);
    Ok(())
}

#[test]
fn run_stages_waits_for_detections() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempfile::tempdir()?;
    let paths = StagePaths::in_dir(tmp_dir.path().join("cloud.ply"), tmp_dir.path());
    let config = test_config();
    write_ply_binary(&paths.cloud, &test_cloud()?)?;

    assert!(pipeline::run_stages(&paths, &config)?.is_none());
    assert!(paths.image.exists());
    assert!(paths.correspondences.exists());
    assert!(!paths.output_cloud.exists());

    records::write_detections(&paths.detections, &[square("chair", 960.0, 540.0, 100.0)])?;
    let recoloring = pipeline::run_stages(&paths, &config)?.ok_or("recoloring did not run")?;
    assert_eq!(recoloring.matched, 1);
    assert!(paths.output_cloud.exists());
    assert!(paths.legend.exists());
    Ok(())
}

#[test]
fn stage_failures_write_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempfile::tempdir()?;
    let paths = StagePaths::in_dir(tmp_dir.path().join("cloud.ply"), tmp_dir.path());
    let config = test_config();
    write_ply_binary(&paths.cloud, &PointCloud::new(vec![], None, None)?)?;

    let result = pipeline::project_cloud(&paths.cloud, &config, &paths.image, &paths.correspondences);
    assert!(matches!(
        result,
        Err(pipeline::PipelineError::Projection(_))
    ));
    assert!(!paths.image.exists());
    assert!(!paths.correspondences.exists());

    let missing = tmp_dir.path().join("missing.ply");
    let result = pipeline::project_cloud(&missing, &config, &paths.image, &paths.correspondences);
    match result {
        Err(pipeline::PipelineError::Ply { path, .. }) => assert_eq!(path, missing),
        other => panic!("unexpected result {:?}", other.map(|p| p.correspondences.len())),
    }
    Ok(())
}

fn staged_leftovers(dir: &std::path::Path) -> Result<Vec<String>, std::io::Error> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if name.starts_with(".partial-") {
            names.push(name);
        }
    }
    Ok(names)
}

#[test]
fn failed_second_output_removes_first() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempfile::tempdir()?;
    let paths = StagePaths::in_dir(tmp_dir.path().join("cloud.ply"), tmp_dir.path());
    let config = test_config();
    write_ply_binary(&paths.cloud, &test_cloud()?)?;

    // a directory where the correspondence table should go
    std::fs::create_dir(&paths.correspondences)?;
    std::fs::write(paths.correspondences.join("keep.txt"), b"keep")?;
    let result = pipeline::project_cloud(&paths.cloud, &config, &paths.image, &paths.correspondences);
    match result {
        Err(pipeline::PipelineError::Commit { path, .. }) => assert_eq!(path, paths.correspondences),
        other => panic!("unexpected result {:?}", other.map(|p| p.correspondences.len())),
    }
    assert!(!paths.image.exists());
    assert!(paths.correspondences.join("keep.txt").exists());
    assert!(staged_leftovers(tmp_dir.path())?.is_empty());

    std::fs::remove_dir_all(&paths.correspondences)?;
    pipeline::project_cloud(&paths.cloud, &config, &paths.image, &paths.correspondences)?;
    records::write_detections(&paths.detections, &[square("chair", 960.0, 540.0, 100.0)])?;
    pipeline::classify_correspondences(&paths.correspondences, &paths.detections, &paths.labeled)?;

    // same for the class legend of the recolored cloud
    std::fs::create_dir(&paths.legend)?;
    let result = pipeline::recolor_cloud(
        &paths.cloud,
        &paths.labeled,
        &config,
        &paths.output_cloud,
        &paths.legend,
    );
    match result {
        Err(pipeline::PipelineError::Commit { path, .. }) => assert_eq!(path, paths.legend),
        other => panic!("unexpected result {:?}", other.map(|r| r.matched)),
    }
    assert!(!paths.output_cloud.exists());
    assert!(staged_leftovers(tmp_dir.path())?.is_empty());
    Ok(())
}

#[test]
fn annotate_skips_unusable_detections() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempfile::tempdir()?;
    let paths = StagePaths::in_dir(tmp_dir.path().join("cloud.ply"), tmp_dir.path());
    let config = test_config();
    write_ply_binary(&paths.cloud, &test_cloud()?)?;
    pipeline::project_cloud(&paths.cloud, &config, &paths.image, &paths.correspondences)?;

    let far_outside = square("wall", 1e19, -1e19, 1e19);
    let huge = square("floor", 960.0, 540.0, 1e300);
    let mut negative = square("lamp", 960.0, 540.0, 10.0);
    negative.bounding_box = Some(BoundingBox {
        cx: 960.0,
        cy: 540.0,
        width: -10.0,
        height: 10.0,
    });
    let mut no_outline = square("rug", 960.0, 540.0, 10.0);
    no_outline.polygon = None;
    records::write_detections(
        &paths.detections,
        &[
            far_outside,
            huge,
            negative,
            no_outline,
            square("chair", 960.0, 540.0, 100.0),
        ],
    )?;

    let overlay_path = tmp_dir.path().join("overlay.png");
    pipeline::annotate_detections(&paths.image, &paths.detections, &overlay_path)?;
    let overlay = cloudlabel::io::png::read_image_png_rgb8(&overlay_path)?;
    let image = cloudlabel::io::png::read_image_png_rgb8(&paths.image)?;
    assert_eq!(overlay.size(), image.size());
    assert_eq!(overlay.pixel(910, 540)?, pipeline::POLYGON_COLOR);
    // the rug has no outline, so its box is not drawn either
    assert_eq!(overlay.pixel(955, 540)?, image.pixel(955, 540)?);
    Ok(())
}
