#![warn(missing_docs)]

//! Math kernel for the tumble physics engine.
//!
//! Thin aliases over nalgebra for fixed-size geometry, plus the dense
//! routines the constraint solver needs: a padded row-major [`Matrix`],
//! the three multiply orderings, Cholesky and incremental `LDL^T`
//! factorizations, quaternion/matrix conversion and mass properties.

pub mod cholesky;
pub mod error;
pub mod ldlt;
pub mod mass;
pub mod matrix;
pub mod rotation;

pub use cholesky::Cholesky;
pub use error::{LinalgError, Result};
pub use ldlt::Ldlt;
pub use mass::Mass;
pub use matrix::Matrix;

use nalgebra::{Isometry3, Matrix3, Unit, UnitQuaternion, Vector3};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A 3x3 matrix (rotations, inertia tensors).
pub type Mat3 = Matrix3<f64>;

/// A unit quaternion orientation.
pub type Quat = UnitQuaternion<f64>;

/// A rigid transform (rotation followed by translation).
pub type Pose = Isometry3<f64>;

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance tolerance in metres.
    pub linear: f64,
    /// Angular tolerance in radians.
    pub angular: f64,
}

impl Tolerance {
    /// Default simulation tolerances (1e-9 m linear, 1e-9 rad angular).
    pub const DEFAULT: Self = Self {
        linear: 1e-9,
        angular: 1e-9,
    };

    /// Check if two points are coincident within tolerance.
    pub fn points_equal(&self, a: &Point3, b: &Point3) -> bool {
        (a - b).norm() < self.linear
    }

    /// Check if a scalar distance is effectively zero.
    pub fn is_zero(&self, d: f64) -> bool {
        d.abs() < self.linear
    }

    /// Check if a vector is too short to define a direction.
    pub fn is_degenerate(&self, v: &Vec3) -> bool {
        !(v.norm_squared() > self.linear * self.linear)
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Whether every component of a vector is finite.
pub fn is_finite_vec(v: &Vec3) -> bool {
    v.iter().all(|c| c.is_finite())
}

/// Whether a pose has a finite translation and a finite, non-degenerate rotation.
pub fn is_finite_pose(p: &Pose) -> bool {
    is_finite_vec(&p.translation.vector)
        && p.rotation.coords.iter().all(|c| c.is_finite())
        && p.rotation.norm() > 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerance_points_equal() {
        let tol = Tolerance::DEFAULT;
        let a = Point3::new(1.0, 2.0, 3.0);
        let b = Point3::new(1.0 + 1e-10, 2.0, 3.0);
        assert!(tol.points_equal(&a, &b));
        let c = Point3::new(1.001, 2.0, 3.0);
        assert!(!tol.points_equal(&a, &c));
    }

    #[test]
    fn test_degenerate_vectors() {
        let tol = Tolerance::DEFAULT;
        assert!(tol.is_degenerate(&Vec3::zeros()));
        assert!(tol.is_degenerate(&Vec3::new(f64::NAN, 0.0, 0.0)));
        assert!(!tol.is_degenerate(&Vec3::x()));
    }

    #[test]
    fn test_finite_pose() {
        assert!(is_finite_pose(&Pose::identity()));
        let mut p = Pose::identity();
        p.translation.vector.x = f64::NAN;
        assert!(!is_finite_pose(&p));
    }
}
