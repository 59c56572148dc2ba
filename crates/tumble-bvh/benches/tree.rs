use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tumble_bvh::{Aabb, AabbTree, SplitStrategy, TreeConfig};
use tumble_math::{Point3, Vec3};

fn scattered(n: usize) -> Vec<Aabb> {
    // Deterministic low-discrepancy scatter.
    (0..n)
        .map(|i| {
            let t = i as f64;
            let c = Point3::new(
                (t * 0.618_034).fract() * 100.0,
                (t * 0.414_214).fract() * 100.0,
                (t * 0.732_051).fract() * 100.0,
            );
            Aabb::from_center_half_extents(c, Vec3::new(0.5, 0.5, 0.5))
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for n in [256usize, 4096] {
        let bounds = scattered(n);
        for split in [
            SplitStrategy::LargestAxis,
            SplitStrategy::GeometricCenter,
            SplitStrategy::Balanced,
        ] {
            group.bench_with_input(BenchmarkId::new(format!("{split:?}"), n), &bounds, |b, bounds| {
                b.iter(|| AabbTree::build_with(black_box(bounds), TreeConfig { split, leaf_size: 1 }))
            });
        }
    }
    group.finish();
}

fn bench_refit_and_query(c: &mut Criterion) {
    let bounds = scattered(4096);
    let mut tree = AabbTree::build(&bounds).unwrap();
    c.bench_function("refit_4096", |b| b.iter(|| tree.refit(black_box(&bounds))));

    let tree = AabbTree::build(&bounds).unwrap();
    let query = Aabb::from_center_half_extents(Point3::new(50.0, 50.0, 50.0), Vec3::new(5.0, 5.0, 5.0));
    let mut stack = Vec::new();
    let mut out = Vec::new();
    c.bench_function("query_4096", |b| {
        b.iter(|| {
            out.clear();
            tree.query_overlaps_with(black_box(&query), &mut stack, &mut out);
            out.len()
        })
    });
}

criterion_group!(benches, bench_build, bench_refit_and_query);
criterion_main!(benches);
