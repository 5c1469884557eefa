use argh::FromArgs;
use std::path::PathBuf;

use cloudlabel::{
    config::PipelineConfig,
    pipeline::{self, StagePaths},
};

#[derive(FromArgs)]
/// Label a point cloud with the detections found on its projection
struct Args {
    /// path to a JSON pipeline configuration, defaults are used when omitted
    #[argh(option)]
    config: Option<PathBuf>,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Project(ProjectArgs),
    Classify(ClassifyArgs),
    Recolor(RecolorArgs),
    Annotate(AnnotateArgs),
    Run(RunArgs),
}

#[derive(FromArgs)]
/// Render the point cloud and write the 3D to 2D correspondences
#[argh(subcommand, name = "project")]
struct ProjectArgs {
    /// path to the input PLY point cloud
    #[argh(option)]
    cloud: PathBuf,

    /// path to the output PNG image
    #[argh(option, default = "PathBuf::from(\"projection.png\")")]
    image: PathBuf,

    /// path to the output correspondence table
    #[argh(option, default = "PathBuf::from(\"correspondences.json\")")]
    correspondences: PathBuf,
}

#[derive(FromArgs)]
/// Label the correspondences falling inside the detections
#[argh(subcommand, name = "classify")]
struct ClassifyArgs {
    /// path to the correspondence table
    #[argh(option, default = "PathBuf::from(\"correspondences.json\")")]
    correspondences: PathBuf,

    /// path to the detector output
    #[argh(option, default = "PathBuf::from(\"detections.json\")")]
    detections: PathBuf,

    /// path to the output labeled points
    #[argh(option, default = "PathBuf::from(\"labeled_points.json\")")]
    labeled: PathBuf,
}

#[derive(FromArgs)]
/// Paint the labeled points onto the point cloud
#[argh(subcommand, name = "recolor")]
struct RecolorArgs {
    /// path to the input PLY point cloud
    #[argh(option)]
    cloud: PathBuf,

    /// path to the labeled points
    #[argh(option, default = "PathBuf::from(\"labeled_points.json\")")]
    labeled: PathBuf,

    /// path to the output PLY point cloud
    #[argh(option, default = "PathBuf::from(\"labeled_cloud.ply\")")]
    output: PathBuf,

    /// path to the output class color legend
    #[argh(option, default = "PathBuf::from(\"class_colors.json\")")]
    legend: PathBuf,
}

#[derive(FromArgs)]
/// Draw the detections over the rendered image
#[argh(subcommand, name = "annotate")]
struct AnnotateArgs {
    /// path to the rendered PNG image
    #[argh(option, default = "PathBuf::from(\"projection.png\")")]
    image: PathBuf,

    /// path to the detector output
    #[argh(option, default = "PathBuf::from(\"detections.json\")")]
    detections: PathBuf,

    /// path to the output PNG image
    #[argh(option, default = "PathBuf::from(\"detections.png\")")]
    output: PathBuf,
}

#[derive(FromArgs)]
/// Run every stage whose inputs are available
#[argh(subcommand, name = "run")]
struct RunArgs {
    /// path to the input PLY point cloud
    #[argh(option)]
    cloud: PathBuf,

    /// directory holding the intermediate and output files
    #[argh(option, default = "PathBuf::from(\".\")")]
    workdir: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    match args.command {
        Command::Project(cmd) => {
            let projection =
                pipeline::project_cloud(&cmd.cloud, &config, &cmd.image, &cmd.correspondences)?;
            println!(
                "Projected #{} points to {}",
                projection.correspondences.len(),
                cmd.image.display()
            );
        }
        Command::Classify(cmd) => {
            let labeled = pipeline::classify_correspondences(
                &cmd.correspondences,
                &cmd.detections,
                &cmd.labeled,
            )?;
            println!("Labeled #{} points", labeled.len());
        }
        Command::Recolor(cmd) => {
            let recoloring =
                pipeline::recolor_cloud(&cmd.cloud, &cmd.labeled, &config, &cmd.output, &cmd.legend)?;
            println!(
                "Recolored #{} points, discarded #{} labels",
                recoloring.matched, recoloring.discarded
            );
            for (class_name, color) in &recoloring.class_colors {
                println!("  {class_name}: {color:?}");
            }
        }
        Command::Annotate(cmd) => {
            pipeline::annotate_detections(&cmd.image, &cmd.detections, &cmd.output)?;
            println!("Annotated image written to {}", cmd.output.display());
        }
        Command::Run(cmd) => {
            std::fs::create_dir_all(&cmd.workdir)?;
            let paths = StagePaths::in_dir(&cmd.cloud, &cmd.workdir);
            match pipeline::run_stages(&paths, &config)? {
                Some(recoloring) => println!(
                    "Labeled point cloud written to {} ({} classes)",
                    paths.output_cloud.display(),
                    recoloring.class_colors.len()
                ),
                None => println!(
                    "Waiting for detections: run the detector on {} and write {}",
                    paths.image.display(),
                    paths.detections.display()
                ),
            }
        }
    }

    Ok(())
}
