//! Whole-world scenarios: resting contact, determinism, checkpoints and
//! sleeping.

use tumble_collide::Shape;
use tumble_dynamics::{
    PhysicsError, SolverMethod, SolverPath, SurfaceParams, World, WorldConfig, WorldSnapshot,
};
use tumble_math::{Mass, Point3, Pose, Quat, Vec3};

const DT: f64 = 0.01;

fn ground(world: &mut World) {
    world
        .add_static_geom(Shape::plane(Vec3::z(), 0.0).unwrap(), Pose::identity())
        .unwrap();
}

fn add_box(world: &mut World, at: Point3, size: f64) -> tumble_dynamics::BodyId {
    let b = world.add_body(at).unwrap();
    world.set_body_mass(b, Mass::box_total(1.0, size, size, size)).unwrap();
    world
        .add_geom(b, Shape::cuboid(size, size, size).unwrap(), Pose::identity())
        .unwrap();
    b
}

fn add_ball(world: &mut World, at: Point3, radius: f64) -> tumble_dynamics::BodyId {
    let b = world.add_body(at).unwrap();
    world.set_body_mass(b, Mass::sphere_total(1.0, radius)).unwrap();
    world.add_geom(b, Shape::sphere(radius).unwrap(), Pose::identity()).unwrap();
    b
}

/// Lowest corner of a cube of edge `size`.
fn lowest_corner(world: &World, b: tumble_dynamics::BodyId, size: f64) -> f64 {
    let body = world.body(b).unwrap();
    let h = size / 2.0;
    let mut z = f64::INFINITY;
    for &x in &[-h, h] {
        for &y in &[-h, h] {
            for &c in &[-h, h] {
                z = z.min(body.body_point_to_world(&Point3::new(x, y, c)).z);
            }
        }
    }
    z
}

#[test]
fn ball_joint_pair_at_rest_stays_put() {
    let mut world = World::with_config(WorldConfig::zero_gravity()).unwrap();
    let a = world.add_body(Point3::new(-1.0, 0.0, 0.0)).unwrap();
    let b = world.add_body(Point3::new(1.0, 0.0, 0.0)).unwrap();
    for id in [a, b] {
        world.set_body_mass(id, Mass::sphere_total(1.0, 0.2)).unwrap();
    }
    let anchor = Point3::origin();
    world.add_ball_joint(a, Some(b), anchor).unwrap();

    for _ in 0..50 {
        world.step(DT).unwrap();
    }
    for id in [a, b] {
        let d = (world.body(id).unwrap().position() - anchor).norm();
        assert!((d - 1.0).abs() < 1e-3, "distance {d}");
    }
    assert!(world.kinetic_energy() < 1e-6);
}

#[test]
fn dropped_box_settles_on_plane() {
    let mut world = World::with_config(WorldConfig::default().with_gravity(Vec3::new(0.0, 0.0, -9.8))).unwrap();
    ground(&mut world);
    let b = add_box(&mut world, Point3::new(0.0, 0.0, 1.0), 1.0);

    let mut highest = f64::NEG_INFINITY;
    let mut landed = false;
    for _ in 0..200 {
        world.step(DT).unwrap();
        let low = lowest_corner(&world, b, 1.0);
        assert!(low > -0.05, "sank to {low}");
        landed |= !world.contacts().is_empty();
        if landed {
            highest = highest.max(world.body(b).unwrap().position().z);
        }
    }
    assert!(landed);
    assert!(highest < 1.0, "rebounded to {highest}");
    let low = lowest_corner(&world, b, 1.0);
    assert!(low.abs() < 0.01, "rests at {low}");
    assert!(world.kinetic_energy() < 1e-3);
    let q = world.body(b).unwrap().orientation();
    assert!(q.angle() < 1e-2);
}

#[test]
fn orientation_stays_unit_while_tumbling() {
    let mut world = World::new();
    ground(&mut world);
    let b = add_box(&mut world, Point3::new(0.0, 0.0, 2.0), 0.5);
    world.set_angular_velocity(b, Vec3::new(7.0, -3.0, 11.0)).unwrap();
    world.set_linear_velocity(b, Vec3::new(1.0, 0.0, 0.0)).unwrap();
    for _ in 0..300 {
        world.step(DT).unwrap();
        let q = world.body(b).unwrap().orientation();
        assert!((q.quaternion().norm() - 1.0).abs() <= 1e-6);
    }
}

fn busy_world() -> World {
    let mut world = World::new();
    ground(&mut world);
    for i in 0..3 {
        add_box(&mut world, Point3::new(0.05 * i as f64, 0.0, 0.5 + 1.1 * i as f64), 1.0);
    }
    let mut prev = None;
    for i in 0..4 {
        let ball = add_ball(&mut world, Point3::new(3.0 + 0.5 * i as f64, 0.0, 3.0), 0.2);
        world.add_ball_joint(ball, prev, Point3::new(2.75 + 0.5 * i as f64, 0.0, 3.0)).unwrap();
        prev = Some(ball);
    }
    world
}

fn poses(world: &World) -> Vec<(Point3, Quat)> {
    world.bodies().map(|(_, b)| (b.position(), b.orientation())).collect()
}

#[test]
fn identical_runs_are_bit_identical() {
    let mut a = busy_world();
    let mut b = busy_world();
    for _ in 0..150 {
        a.step(DT).unwrap();
        b.step(DT).unwrap();
    }
    assert_eq!(poses(&a), poses(&b));
}

#[test]
fn restored_snapshot_replays_exactly() {
    let mut world = busy_world();
    for _ in 0..60 {
        world.step(DT).unwrap();
    }
    let json = world.snapshot().to_json().unwrap();
    for _ in 0..60 {
        world.step(DT).unwrap();
    }
    let continued = poses(&world);

    world.restore(&WorldSnapshot::from_json(&json).unwrap()).unwrap();
    for _ in 0..60 {
        world.step(DT).unwrap();
    }
    assert_eq!(poses(&world), continued);
}

#[test]
fn idle_box_sleeps_and_force_wakes_it() {
    let mut world = World::with_config(WorldConfig::default().with_auto_disable(true)).unwrap();
    ground(&mut world);
    let b = add_box(&mut world, Point3::new(0.0, 0.0, 0.5), 1.0);
    for _ in 0..300 {
        world.step(DT).unwrap();
    }
    assert!(!world.body(b).unwrap().is_enabled());
    assert_eq!(world.last_step_stats().bodies, 0);
    let z = world.body(b).unwrap().position().z;
    world.step(DT).unwrap();
    assert_eq!(world.body(b).unwrap().position().z, z);

    world.add_force(b, Vec3::new(0.0, 0.0, 100.0)).unwrap();
    assert!(world.body(b).unwrap().is_enabled());
    world.step(DT).unwrap();
    assert!(world.body(b).unwrap().position().z > z);
}

#[test]
fn moving_body_wakes_sleeping_neighbour() {
    let mut world = World::new();
    ground(&mut world);
    let sleeper = add_box(&mut world, Point3::new(0.0, 0.0, 0.5), 1.0);
    world.disable_body(sleeper).unwrap();
    let ball = add_ball(&mut world, Point3::new(0.0, 0.0, 1.3), 0.25);
    world.set_linear_velocity(ball, Vec3::new(0.0, 0.0, -2.0)).unwrap();
    for _ in 0..20 {
        world.step(DT).unwrap();
    }
    assert!(world.body(sleeper).unwrap().is_enabled());
}

#[test]
fn bouncy_ball_rebounds_below_drop_height() {
    let mut world = World::new();
    ground(&mut world);
    let ball = add_ball(&mut world, Point3::new(0.0, 0.0, 1.0), 0.1);
    let geom = world.geoms().find(|(_, g)| g.body() == Some(ball)).map(|(id, _)| id).unwrap();
    world
        .set_geom_surface(geom, Some(SurfaceParams::default().with_bounce(0.8, 0.1)))
        .unwrap();

    let mut bounced = false;
    let mut apex: f64 = 0.0;
    for _ in 0..150 {
        world.step(DT).unwrap();
        let body = world.body(ball).unwrap();
        if body.linear_velocity().z > 0.5 {
            bounced = true;
        }
        if bounced {
            apex = apex.max(body.position().z);
        }
    }
    assert!(bounced);
    assert!(apex > 0.3 && apex < 1.0, "apex {apex}");
}

#[test]
fn masks_and_joints_suppress_contacts() {
    let mut world = World::with_config(WorldConfig::zero_gravity()).unwrap();
    let a = add_ball(&mut world, Point3::origin(), 0.5);
    let b = add_ball(&mut world, Point3::new(0.6, 0.0, 0.0), 0.5);
    world.step(DT).unwrap();
    assert!(!world.contacts().is_empty());
    assert!(world.contacts().iter().all(|c| c.involves(a) && c.involves(b)));

    let j = world.add_ball_joint(a, Some(b), Point3::new(0.3, 0.0, 0.0)).unwrap();
    world.step(DT).unwrap();
    assert!(world.contacts().is_empty());

    world.remove_joint(j).unwrap();
    let geoms: Vec<_> = world.geoms().map(|(id, _)| id).collect();
    world.set_geom_masks(geoms[0], 0b01, 0b01).unwrap();
    world.set_geom_masks(geoms[1], 0b10, 0b10).unwrap();
    world.step(DT).unwrap();
    assert!(world.contacts().is_empty());
}

#[test]
fn contact_normal_points_into_second_geom() {
    let mut world = World::new();
    ground(&mut world);
    let ball = add_ball(&mut world, Point3::new(0.0, 0.0, 0.19), 0.2);
    world.step(DT).unwrap();
    let c = world.contacts()[0];
    assert_eq!(c.body1, None);
    assert_eq!(c.body2, Some(ball));
    assert!((c.normal() - Vec3::z()).norm() < 1e-9);
}

#[test]
fn solver_path_follows_system_shape() {
    let mut world = World::with_config(WorldConfig::zero_gravity()).unwrap();
    let a = add_ball(&mut world, Point3::new(0.0, 0.0, 5.0), 0.1);
    world.add_ball_joint(a, None, Point3::new(0.0, 0.0, 5.5)).unwrap();
    world.step(DT).unwrap();
    assert_eq!(world.last_step_stats().solver, Some(SolverPath::Direct));
    assert_eq!(world.last_step_stats().joint_rows, 3);

    let mut world = World::new();
    ground(&mut world);
    add_ball(&mut world, Point3::new(0.0, 0.0, 0.19), 0.2);
    world.step(DT).unwrap();
    assert_eq!(world.last_step_stats().solver, Some(SolverPath::Iterative));

    world
        .set_config(WorldConfig::default().with_solver(SolverMethod::Direct))
        .unwrap();
    world.step(DT).unwrap();
    assert_eq!(world.last_step_stats().solver, Some(SolverPath::ActiveSet));
}

#[test]
fn timings_recorded_on_request() {
    let mut config = WorldConfig::default();
    config.record_timings = true;
    let mut world = World::with_config(config).unwrap();
    ground(&mut world);
    add_box(&mut world, Point3::new(0.0, 0.0, 0.45), 1.0);
    world.step(DT).unwrap();
    let stats = world.last_step_stats();
    assert!(stats.timings.is_some());
    assert!(stats.contacts > 0);
    assert!(stats.rows >= stats.contacts);
}

#[test]
fn unmassed_body_blocks_step() {
    let mut world = World::new();
    let ghost = world.add_body(Point3::origin()).unwrap();
    let ball = add_ball(&mut world, Point3::new(0.0, 0.0, 1.0), 0.1);
    assert_eq!(world.step(DT), Err(PhysicsError::MissingMass(ghost)));
    assert_eq!(world.body(ball).unwrap().position().z, 1.0);
}
