use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};

use cloudlabel_3d::{
    camera::CameraModel,
    pointcloud::PointCloud,
    projection::{self, PaintOrder, ProjectorConfig},
    recolor::{self, RecolorConfig},
    segmentation::LabeledPoint,
};

// points spread in a frustum in front of the default camera
fn random_cloud(num_points: usize, rng: &mut StdRng) -> PointCloud {
    let points = (0..num_points)
        .map(|_| {
            let z = rng.random_range(1.0..10.0);
            [
                rng.random_range(-0.8..0.8) * z,
                rng.random_range(-0.5..0.5) * z,
                z,
            ]
        })
        .collect::<Vec<_>>();
    let colors = (0..num_points)
        .map(|_| [rng.random::<f64>(), rng.random::<f64>(), rng.random::<f64>()])
        .collect::<Vec<_>>();
    // lengths match by construction
    PointCloud::new(points, Some(colors), None).unwrap()
}

fn bench_project(c: &mut Criterion) {
    let mut group = c.benchmark_group("project");
    let camera = CameraModel::default();

    for num_points in [10_000, 100_000, 500_000].iter() {
        group.throughput(criterion::Throughput::Elements(*num_points as u64));
        let parameter_string = format!("{}", num_points);
        let cloud = random_cloud(*num_points, &mut StdRng::seed_from_u64(0));

        for paint_order in [PaintOrder::LastWins, PaintOrder::NearestDepth] {
            let config = ProjectorConfig {
                paint_order,
                ..Default::default()
            };
            group.bench_with_input(
                BenchmarkId::new(format!("{paint_order:?}"), &parameter_string),
                &(&cloud, &config),
                |b, (cloud, config)| {
                    b.iter(|| black_box(projection::project(cloud, &camera, config).unwrap()));
                },
            );
        }
    }
}

fn bench_recolor(c: &mut Criterion) {
    let mut group = c.benchmark_group("recolor");

    for num_points in [10_000, 100_000, 500_000].iter() {
        group.throughput(criterion::Throughput::Elements(*num_points as u64));
        let parameter_string = format!("{}", num_points);
        let mut rng = StdRng::seed_from_u64(1);
        let cloud = random_cloud(*num_points, &mut rng);

        // label a tenth of the cloud, cycling over a few classes
        let labeled = cloud
            .points()
            .iter()
            .step_by(10)
            .enumerate()
            .map(|(i, p)| LabeledPoint {
                class_name: format!("class_{}", i % 5),
                point_3d: *p,
                pixel: [0, 0],
            })
            .collect::<Vec<_>>();

        group.bench_with_input(
            BenchmarkId::new("recolor", &parameter_string),
            &(&cloud, &labeled),
            |b, (cloud, labeled)| {
                b.iter(|| {
                    let mut rng = StdRng::seed_from_u64(42);
                    black_box(
                        recolor::recolor(cloud, labeled, &RecolorConfig::default(), &mut rng)
                            .unwrap(),
                    )
                });
            },
        );
    }
}

criterion_group!(benches, bench_project, bench_recolor);
criterion_main!(benches);
