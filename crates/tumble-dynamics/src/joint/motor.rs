//! Angular and linear motors: up to three independently driven axes.

use serde::{Deserialize, Serialize};
use tumble_math::Vec3;

use super::frame::JointBodies;
use super::limit::LimitMotor;
use crate::row::{RowJacobian, RowWriter};

/// Most axes a motor joint drives.
pub const MAX_MOTOR_AXES: usize = 3;

/// Frame an axis is fixed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AxisFrame {
    /// Fixed in the world.
    #[default]
    Global,
    /// Rotates with body 1.
    Body1,
    /// Rotates with body 2 (the world when there is no body 2).
    Body2,
}

/// One driven axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorAxis {
    /// Frame the axis is fixed in.
    pub frame: AxisFrame,
    /// Unit axis in that frame.
    pub axis: Vec3,
    /// Stops and motor.
    pub limit: LimitMotor,
}

impl MotorAxis {
    /// Axis given in world coordinates, stored in `frame`.
    pub(crate) fn new(jb: &JointBodies, frame: AxisFrame, world_axis: &Vec3) -> Self {
        let axis = match frame {
            AxisFrame::Global => *world_axis,
            AxisFrame::Body1 => jb.q1.inverse_transform_vector(world_axis),
            AxisFrame::Body2 => jb.q2.inverse_transform_vector(world_axis),
        };
        Self {
            frame,
            axis,
            limit: LimitMotor::default(),
        }
    }

    /// Axis in world coordinates.
    pub(crate) fn world_axis(&self, jb: &JointBodies) -> Vec3 {
        match self.frame {
            AxisFrame::Global => self.axis,
            AxisFrame::Body1 => jb.q1 * self.axis,
            AxisFrame::Body2 => jb.q2 * self.axis,
        }
    }
}

/// Rotational motor. Angles are supplied by the caller (for example from
/// an encoder model) and only feed the stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngularMotor {
    /// Driven axes.
    pub axes: Vec<MotorAxis>,
    /// Caller-supplied angle per axis.
    pub angles: Vec<f64>,
}

impl AngularMotor {
    pub(crate) fn new(axes: Vec<MotorAxis>) -> Self {
        let angles = vec![0.0; axes.len()];
        Self { axes, angles }
    }

    pub(crate) fn row_count(&self) -> usize {
        self.axes
            .iter()
            .zip(&self.angles)
            .filter(|(a, angle)| a.limit.is_active(**angle))
            .count()
    }

    pub(crate) fn fill(&self, jb: &JointBodies, w: &mut RowWriter<'_>) {
        for (a, &angle) in self.axes.iter().zip(&self.angles) {
            if a.limit.is_active(angle) {
                let ax = a.world_axis(jb);
                let rate = ax.dot(&(jb.w1 - jb.w2));
                a.limit.add_row(w, RowJacobian::angular(ax), angle, rate);
            }
        }
    }
}

/// Linear motor. Positions are measured along each axis from the relative
/// placement of the bodies at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearMotor {
    /// Driven axes.
    pub axes: Vec<MotorAxis>,
    /// `p1 - p2` at creation.
    pub origin: Vec3,
}

impl LinearMotor {
    pub(crate) fn new(jb: &JointBodies, axes: Vec<MotorAxis>) -> Self {
        Self {
            axes,
            origin: jb.p1 - jb.p2,
        }
    }

    /// Position along axis `i`.
    pub(crate) fn position(&self, jb: &JointBodies, i: usize) -> f64 {
        self.axes[i]
            .world_axis(jb)
            .dot(&((jb.p1 - jb.p2) - self.origin))
    }

    pub(crate) fn row_count(&self, jb: &JointBodies) -> usize {
        (0..self.axes.len())
            .filter(|&i| self.axes[i].limit.is_active(self.position(jb, i)))
            .count()
    }

    pub(crate) fn fill(&self, jb: &JointBodies, w: &mut RowWriter<'_>) {
        for (i, a) in self.axes.iter().enumerate() {
            let pos = self.position(jb, i);
            if a.limit.is_active(pos) {
                let ax = a.world_axis(jb);
                let rate = ax.dot(&(jb.v1 - jb.v2));
                a.limit.add_row(w, RowJacobian::linear(ax), pos, rate);
            }
        }
    }
}
