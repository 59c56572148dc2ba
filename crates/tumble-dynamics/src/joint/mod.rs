//! Joints between two bodies, or between a body and the world.
//!
//! The joint set is closed: [`JointKind`] enumerates every kind, and the
//! stepper asks each joint for its row count and then for the rows
//! themselves through a single `match`.

mod ball;
mod fixed;
pub(crate) mod frame;
mod hinge;
mod limit;
mod motor;
mod slider;
mod universal;

pub use ball::BallJoint;
pub use fixed::FixedJoint;
pub use hinge::HingeJoint;
pub use limit::{JointParam, LimitMotor, LimitState};
pub use motor::{AngularMotor, AxisFrame, LinearMotor, MotorAxis, MAX_MOTOR_AXES};
pub use slider::SliderJoint;
pub use universal::UniversalJoint;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use tumble_math::{Point3, Vec3};

use crate::body::BodyId;
use crate::row::RowWriter;
use frame::JointBodies;

new_key_type! {
    /// Generation-checked handle to a joint.
    pub struct JointId;
}

/// Constraint forces a joint applied during the last step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JointFeedback {
    /// Force on body 1.
    pub force1: Vec3,
    /// Torque on body 1 about its centre of mass.
    pub torque1: Vec3,
    /// Force on body 2.
    pub force2: Vec3,
    /// Torque on body 2 about its centre of mass.
    pub torque2: Vec3,
}

/// Joint kinds with their kind-specific state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JointKind {
    /// Ball-and-socket.
    Ball(BallJoint),
    /// Single rotational axis.
    Hinge(HingeJoint),
    /// Single translational axis.
    Slider(SliderJoint),
    /// No relative motion.
    Fixed(FixedJoint),
    /// Two perpendicular rotational axes.
    Universal(UniversalJoint),
    /// Up to three driven rotational axes.
    AngularMotor(AngularMotor),
    /// Up to three driven translational axes.
    LinearMotor(LinearMotor),
}

impl JointKind {
    /// Short name for messages.
    pub fn name(&self) -> &'static str {
        match self {
            JointKind::Ball(_) => "ball",
            JointKind::Hinge(_) => "hinge",
            JointKind::Slider(_) => "slider",
            JointKind::Fixed(_) => "fixed",
            JointKind::Universal(_) => "universal",
            JointKind::AngularMotor(_) => "angular motor",
            JointKind::LinearMotor(_) => "linear motor",
        }
    }

    pub(crate) fn row_count(&self, jb: &JointBodies) -> usize {
        match self {
            JointKind::Ball(j) => j.row_count(),
            JointKind::Hinge(j) => j.row_count(jb),
            JointKind::Slider(j) => j.row_count(jb),
            JointKind::Fixed(j) => j.row_count(),
            JointKind::Universal(j) => j.row_count(),
            JointKind::AngularMotor(j) => j.row_count(),
            JointKind::LinearMotor(j) => j.row_count(jb),
        }
    }

    pub(crate) fn fill(&self, jb: &JointBodies, w: &mut RowWriter<'_>) {
        match self {
            JointKind::Ball(j) => j.fill(jb, w),
            JointKind::Hinge(j) => j.fill(jb, w),
            JointKind::Slider(j) => j.fill(jb, w),
            JointKind::Fixed(j) => j.fill(jb, w),
            JointKind::Universal(j) => j.fill(jb, w),
            JointKind::AngularMotor(j) => j.fill(jb, w),
            JointKind::LinearMotor(j) => j.fill(jb, w),
        }
    }

    /// Number of axes carrying stops or a motor.
    pub fn axis_count(&self) -> usize {
        match self {
            JointKind::Hinge(_) | JointKind::Slider(_) => 1,
            JointKind::AngularMotor(m) => m.axes.len(),
            JointKind::LinearMotor(m) => m.axes.len(),
            _ => 0,
        }
    }

    /// Stops and motor of axis `axis`.
    pub fn limit_motor(&self, axis: usize) -> Option<&LimitMotor> {
        match self {
            JointKind::Hinge(j) if axis == 0 => Some(&j.limit),
            JointKind::Slider(j) if axis == 0 => Some(&j.limit),
            JointKind::AngularMotor(m) => m.axes.get(axis).map(|a| &a.limit),
            JointKind::LinearMotor(m) => m.axes.get(axis).map(|a| &a.limit),
            _ => None,
        }
    }

    pub(crate) fn limit_motor_mut(&mut self, axis: usize) -> Option<&mut LimitMotor> {
        match self {
            JointKind::Hinge(j) if axis == 0 => Some(&mut j.limit),
            JointKind::Slider(j) if axis == 0 => Some(&mut j.limit),
            JointKind::AngularMotor(m) => m.axes.get_mut(axis).map(|a| &mut a.limit),
            JointKind::LinearMotor(m) => m.axes.get_mut(axis).map(|a| &mut a.limit),
            _ => None,
        }
    }

    pub(crate) fn anchors(&self, jb: &JointBodies) -> Option<(Point3, Point3)> {
        match self {
            JointKind::Ball(j) => Some(j.anchors(jb)),
            JointKind::Hinge(j) => Some(j.anchors(jb)),
            JointKind::Universal(j) => Some(j.anchors(jb)),
            _ => None,
        }
    }
}

/// A joint and its attachment.
#[derive(Debug, Clone)]
pub struct Joint {
    pub(crate) kind: JointKind,
    pub(crate) body1: BodyId,
    pub(crate) body2: Option<BodyId>,
    pub(crate) erp: Option<f64>,
    pub(crate) cfm: Option<f64>,
    pub(crate) feedback: Option<JointFeedback>,
}

impl Joint {
    pub(crate) fn new(kind: JointKind, body1: BodyId, body2: Option<BodyId>) -> Self {
        Self {
            kind,
            body1,
            body2,
            erp: None,
            cfm: None,
            feedback: None,
        }
    }

    /// Kind and kind-specific state.
    pub fn kind(&self) -> &JointKind {
        &self.kind
    }

    /// First body.
    pub fn body1(&self) -> BodyId {
        self.body1
    }

    /// Second body, `None` for the world.
    pub fn body2(&self) -> Option<BodyId> {
        self.body2
    }

    /// Error reduction override.
    pub fn erp(&self) -> Option<f64> {
        self.erp
    }

    /// Softness override.
    pub fn cfm(&self) -> Option<f64> {
        self.cfm
    }

    /// Constraint forces from the last step, when feedback is enabled.
    pub fn feedback(&self) -> Option<&JointFeedback> {
        self.feedback.as_ref()
    }

    /// Whether the joint links the two bodies, in either order.
    pub(crate) fn connects(&self, a: BodyId, b: BodyId) -> bool {
        (self.body1 == a && self.body2 == Some(b)) || (self.body1 == b && self.body2 == Some(a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use tumble_math::Mass;

    fn bodies() -> (Body, Body) {
        let mut a = Body::new(Point3::new(-1.0, 0.0, 0.0));
        let mut b = Body::new(Point3::new(1.0, 0.0, 0.0));
        a.set_mass(Mass::sphere_total(1.0, 0.2));
        b.set_mass(Mass::sphere_total(1.0, 0.2));
        (a, b)
    }

    fn rows_for(kind: &JointKind, jb: &JointBodies) -> usize {
        let mut rows = Vec::new();
        let mut w = RowWriter::new(&mut rows, Some(0), Some(1), 0.01, 0.2, 1e-5).unwrap();
        kind.fill(jb, &mut w);
        rows.len()
    }

    #[test]
    fn test_row_counts_match_fill() {
        let (a, b) = bodies();
        let jb = JointBodies::new(&a, Some(&b));
        let origin = Point3::origin();
        let mut hinge = HingeJoint::new(&jb, &origin, &Vec3::z());
        let plain = [
            JointKind::Ball(BallJoint::new(&jb, &origin)),
            JointKind::Hinge(hinge),
            JointKind::Slider(SliderJoint::new(&jb, &Vec3::x())),
            JointKind::Fixed(FixedJoint::new(&jb)),
            JointKind::Universal(UniversalJoint::new(&jb, &origin, &Vec3::y(), &Vec3::z())),
        ];
        let expected = [3, 5, 5, 6, 4];
        for (kind, n) in plain.iter().zip(expected) {
            assert_eq!(kind.row_count(&jb), n, "{}", kind.name());
            assert_eq!(rows_for(kind, &jb), n, "{}", kind.name());
        }

        hinge.limit.fmax = 1.0;
        let powered = JointKind::Hinge(hinge);
        assert_eq!(powered.row_count(&jb), 6);
        assert_eq!(rows_for(&powered, &jb), 6);
    }

    #[test]
    fn test_motor_rows_only_when_powered() {
        let (a, b) = bodies();
        let jb = JointBodies::new(&a, Some(&b));
        let axes = vec![
            MotorAxis::new(&jb, AxisFrame::Global, &Vec3::x()),
            MotorAxis::new(&jb, AxisFrame::Body1, &Vec3::y()),
        ];
        let mut kind = JointKind::AngularMotor(AngularMotor::new(axes.clone()));
        assert_eq!(kind.row_count(&jb), 0);
        kind.limit_motor_mut(1).unwrap().fmax = 2.0;
        assert_eq!(kind.row_count(&jb), 1);
        assert_eq!(rows_for(&kind, &jb), 1);

        let mut lin = JointKind::LinearMotor(LinearMotor::new(&jb, axes));
        assert_eq!(lin.axis_count(), 2);
        assert!(lin.limit_motor(2).is_none());
        lin.limit_motor_mut(0).unwrap().hi_stop = -0.1;
        lin.limit_motor_mut(0).unwrap().lo_stop = -1.0;
        // Position 0 is above the upper stop.
        assert_eq!(lin.row_count(&jb), 1);
    }

    #[test]
    fn test_hinge_angle_and_slider_position() {
        let (mut a, b) = bodies();
        let jb0 = JointBodies::new(&a, Some(&b));
        let hinge = HingeJoint::new(&jb0, &Point3::origin(), &Vec3::z());
        let slider = SliderJoint::new(&jb0, &Vec3::x());
        a.orientation = tumble_math::Quat::from_axis_angle(&Vec3::z_axis(), 0.25);
        a.position = Point3::new(-0.5, 0.0, 0.0);
        a.angular_velocity = Vec3::new(0.0, 0.0, 3.0);
        a.linear_velocity = Vec3::new(2.0, 0.0, 0.0);
        let jb = JointBodies::new(&a, Some(&b));
        assert!((hinge.angle(&jb) - 0.25).abs() < 1e-12);
        assert!((hinge.angle_rate(&jb) - 3.0).abs() < 1e-12);
        let a0 = Body::new(Point3::new(-0.5, 0.0, 0.0));
        let jb_slid = JointBodies::new(&a0, Some(&b));
        assert!((slider.position(&jb_slid) - 0.5).abs() < 1e-12);
        let mut moving = a0.clone();
        moving.linear_velocity = Vec3::new(2.0, 0.0, 0.0);
        assert!((slider.position_rate(&JointBodies::new(&moving, Some(&b))) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_connects_either_order() {
        let mut map = slotmap::SlotMap::<BodyId, ()>::with_key();
        let a = map.insert(());
        let b = map.insert(());
        let c = map.insert(());
        let (ba, bb) = bodies();
        let jb = JointBodies::new(&ba, Some(&bb));
        let j = Joint::new(JointKind::Fixed(FixedJoint::new(&jb)), a, Some(b));
        assert!(j.connects(a, b));
        assert!(j.connects(b, a));
        assert!(!j.connects(a, c));
    }
}
