use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tumble_collide::Shape;
use tumble_dynamics::{SolverMethod, World, WorldConfig};
use tumble_math::{Mass, Point3, Pose, Vec3};

/// Columns of boxes resting on a plane, settled for a second.
fn box_stacks(columns: usize, height: usize, method: SolverMethod) -> World {
    let mut world = World::with_config(WorldConfig::default().with_solver(method)).unwrap();
    world
        .add_static_geom(Shape::plane(Vec3::z(), 0.0).unwrap(), Pose::identity())
        .unwrap();
    for c in 0..columns {
        let x = (c % 8) as f64 * 1.5;
        let y = (c / 8) as f64 * 1.5;
        for level in 0..height {
            let b = world.add_body(Point3::new(x, y, 0.5 + level as f64 * 1.01)).unwrap();
            world.set_body_mass(b, Mass::box_total(1.0, 1.0, 1.0, 1.0)).unwrap();
            world
                .add_geom(b, Shape::cuboid(1.0, 1.0, 1.0).unwrap(), Pose::identity())
                .unwrap();
        }
    }
    for _ in 0..100 {
        world.step(0.01).unwrap();
    }
    world
}

/// A chain of spheres hanging from a ball joint at the origin.
fn chain(links: usize) -> World {
    let mut world = World::new();
    let mut prev = None;
    for i in 0..links {
        let b = world.add_body(Point3::new(0.5 * (i + 1) as f64, 0.0, 0.0)).unwrap();
        world.set_body_mass(b, Mass::sphere_total(0.5, 0.1)).unwrap();
        world.add_ball_joint(b, prev, Point3::new(0.5 * i as f64, 0.0, 0.0)).unwrap();
        prev = Some(b);
    }
    world
}

fn bench_stacks(c: &mut Criterion) {
    let mut group = c.benchmark_group("stacks");
    for columns in [4usize, 16] {
        for method in [SolverMethod::Iterative, SolverMethod::Direct] {
            let mut world = box_stacks(columns, 4, method);
            let settled = world.snapshot();
            group.bench_function(BenchmarkId::new(format!("{method:?}"), columns * 4), |b| {
                b.iter(|| {
                    world.restore(&settled).unwrap();
                    world.step(0.01)
                })
            });
        }
    }
    group.finish();
}

fn bench_chain(c: &mut Criterion) {
    let mut world = chain(32);
    c.bench_function("chain_32", |b| b.iter(|| world.step(0.01)));
}

criterion_group!(benches, bench_stacks, bench_chain);
criterion_main!(benches);
