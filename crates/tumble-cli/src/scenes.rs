//! Canned scenes for the `run` command.

use anyhow::Result;
use clap::ValueEnum;
use tumble::{AxisFrame, JointParam, Mass, Point3, Pose, Quat, Shape, SurfaceParams, TriMesh, Vec3, World};

/// Built-in scenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scene {
    /// One box dropped onto the ground
    Drop,
    /// A column of boxes
    Stack,
    /// A chain of spheres hanging from a ball joint
    Chain,
    /// A motor-driven hinge swinging a paddle between stops
    Hinge,
    /// Bouncing balls and a capsule rolling down a mesh ramp
    Ramp,
}

/// Populate `world` with `scene`. `size` scales the body count where the
/// scene has one.
pub fn build(world: &mut World, scene: Scene, size: usize) -> Result<()> {
    match scene {
        Scene::Drop => drop_box(world),
        Scene::Stack => stack(world, size.max(1)),
        Scene::Chain => chain(world, size.max(1)),
        Scene::Hinge => hinge(world),
        Scene::Ramp => ramp(world),
    }
}

fn ground(world: &mut World) -> Result<()> {
    world.add_static_geom(Shape::plane(Vec3::z(), 0.0)?, Pose::identity())?;
    Ok(())
}

fn add_box(world: &mut World, at: Point3, size: f64, mass: f64) -> Result<()> {
    let b = world.add_body(at)?;
    world.set_body_mass(b, Mass::box_total(mass, size, size, size))?;
    world.add_geom(b, Shape::cuboid(size, size, size)?, Pose::identity())?;
    Ok(())
}

fn drop_box(world: &mut World) -> Result<()> {
    ground(world)?;
    let b = world.add_body(Point3::new(0.0, 0.0, 2.0))?;
    world.set_body_mass(b, Mass::box_total(1.0, 1.0, 1.0, 1.0))?;
    world.set_orientation(b, Quat::from_euler_angles(0.3, 0.2, 0.0))?;
    world.add_geom(b, Shape::cuboid(1.0, 1.0, 1.0)?, Pose::identity())?;
    Ok(())
}

fn stack(world: &mut World, height: usize) -> Result<()> {
    ground(world)?;
    for level in 0..height {
        add_box(world, Point3::new(0.0, 0.0, 0.5 + level as f64 * 1.001), 1.0, 1.0)?;
    }
    Ok(())
}

fn chain(world: &mut World, links: usize) -> Result<()> {
    ground(world)?;
    let top = links as f64 * 0.5 + 1.0;
    let mut prev = None;
    for i in 0..links {
        let at = Point3::new(0.5 * (i + 1) as f64, 0.0, top);
        let b = world.add_body(at)?;
        world.set_body_mass(b, Mass::sphere_total(0.5, 0.15))?;
        world.add_geom(b, Shape::sphere(0.15)?, Pose::identity())?;
        world.add_ball_joint(b, prev, Point3::new(0.5 * i as f64, 0.0, top))?;
        prev = Some(b);
    }
    Ok(())
}

fn hinge(world: &mut World) -> Result<()> {
    ground(world)?;
    let paddle = world.add_body(Point3::new(0.75, 0.0, 2.0))?;
    world.set_body_mass(paddle, Mass::box_total(2.0, 1.5, 0.1, 0.5))?;
    world.add_geom(paddle, Shape::cuboid(1.5, 0.1, 0.5)?, Pose::identity())?;
    let j = world.add_hinge_joint(paddle, None, Point3::new(0.0, 0.0, 2.0), Vec3::z())?;
    world.set_joint_param(j, 0, JointParam::LoStop, -1.0)?;
    world.set_joint_param(j, 0, JointParam::HiStop, 1.0)?;
    world.set_motor(j, 0, 2.0, 5.0)?;
    world.set_joint_feedback(j, true)?;

    // A spinning top held upright by an angular motor about world z.
    let top = world.add_body(Point3::new(-2.0, 0.0, 0.5))?;
    world.set_body_mass(top, Mass::capsule(500.0, 0.2, 0.6))?;
    world.add_geom(top, Shape::capsule(0.2, 0.6)?, Pose::identity())?;
    let m = world.add_angular_motor(top, None, &[(AxisFrame::Global, Vec3::z())])?;
    world.set_motor(m, 0, 6.0, 20.0)?;
    Ok(())
}

fn ramp(world: &mut World) -> Result<()> {
    ground(world)?;
    let vertices = vec![
        Point3::new(-2.0, -2.0, 2.0),
        Point3::new(-2.0, 2.0, 2.0),
        Point3::new(4.0, -2.0, 0.0),
        Point3::new(4.0, 2.0, 0.0),
    ];
    let mesh = TriMesh::new(vertices, vec![[0, 2, 1], [1, 2, 3]])?;
    world.add_static_geom(Shape::trimesh(mesh), Pose::identity())?;

    let bouncy = SurfaceParams::default().with_bounce(0.7, 0.1);
    for i in 0..3 {
        let b = world.add_body(Point3::new(-1.5, -1.0 + i as f64, 3.0 + i as f64 * 0.5))?;
        world.set_body_mass(b, Mass::sphere_total(1.0, 0.2))?;
        let g = world.add_geom(b, Shape::sphere(0.2)?, Pose::identity())?;
        world.set_geom_surface(g, Some(bouncy))?;
    }

    // Capsule lying across the slope so it rolls downhill.
    let c = world.add_body(Point3::new(-1.0, 0.0, 2.2))?;
    let across = Quat::from_axis_angle(&Vec3::x_axis(), std::f64::consts::FRAC_PI_2);
    world.set_orientation(c, across)?;
    world.set_body_mass(c, Mass::capsule(300.0, 0.15, 1.0))?;
    world.add_geom(c, Shape::capsule(0.15, 1.0)?, Pose::identity())?;
    Ok(())
}
