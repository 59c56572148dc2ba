//! Rigid-body mass properties.
//!
//! The centre of mass is always the body origin; inertia is expressed in the
//! body frame.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::cholesky::Cholesky;
use crate::error::{LinalgError, Result};
use crate::matrix::Matrix;
use crate::Mat3;

/// Mass and inertia tensor about the centre of mass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mass {
    /// Total mass.
    pub mass: f64,
    /// Inertia tensor in the body frame.
    pub inertia: Mat3,
}

impl Mass {
    /// Build from explicit values. Call [`Mass::check`] before use.
    pub fn new(mass: f64, inertia: Mat3) -> Self {
        Self { mass, inertia }
    }

    /// Solid sphere of the given density.
    pub fn sphere(density: f64, radius: f64) -> Self {
        Self::sphere_total(4.0 / 3.0 * PI * radius.powi(3) * density, radius)
    }

    /// Solid sphere of the given total mass.
    pub fn sphere_total(mass: f64, radius: f64) -> Self {
        let i = 0.4 * mass * radius * radius;
        Self::new(mass, Mat3::from_diagonal_element(i))
    }

    /// Solid box with side lengths `lx`, `ly`, `lz` and the given density.
    pub fn box_(density: f64, lx: f64, ly: f64, lz: f64) -> Self {
        Self::box_total(lx * ly * lz * density, lx, ly, lz)
    }

    /// Solid box of the given total mass.
    pub fn box_total(mass: f64, lx: f64, ly: f64, lz: f64) -> Self {
        let k = mass / 12.0;
        Self::new(
            mass,
            Mat3::new(
                k * (ly * ly + lz * lz),
                0.0,
                0.0,
                0.0,
                k * (lx * lx + lz * lz),
                0.0,
                0.0,
                0.0,
                k * (lx * lx + ly * ly),
            ),
        )
    }

    /// Capsule along the body z axis: a cylinder of `length` capped by two
    /// hemispheres of `radius`.
    pub fn capsule(density: f64, radius: f64, length: f64) -> Self {
        let r2 = radius * radius;
        let m_cyl = PI * r2 * length * density;
        let m_caps = 4.0 / 3.0 * PI * r2 * radius * density;
        let ia = m_cyl * (0.25 * r2 + length * length / 12.0)
            + m_caps * (0.4 * r2 + 0.375 * radius * length + 0.25 * length * length);
        let iz = (0.5 * m_cyl + 0.4 * m_caps) * r2;
        Self::new(
            m_cyl + m_caps,
            Mat3::new(ia, 0.0, 0.0, 0.0, ia, 0.0, 0.0, 0.0, iz),
        )
    }

    /// Solid cylinder along the body z axis.
    pub fn cylinder(density: f64, radius: f64, length: f64) -> Self {
        let r2 = radius * radius;
        let m = PI * r2 * length * density;
        let ia = m * (0.25 * r2 + length * length / 12.0);
        let iz = 0.5 * m * r2;
        Self::new(m, Mat3::new(ia, 0.0, 0.0, 0.0, ia, 0.0, 0.0, 0.0, iz))
    }

    /// Rescale to a new total mass, keeping the distribution.
    pub fn adjust(&mut self, new_mass: f64) {
        if self.mass > 0.0 {
            let s = new_mass / self.mass;
            self.inertia *= s;
        }
        self.mass = new_mass;
    }

    /// Rotate the inertia tensor: `I' = R I R^T`.
    pub fn rotate(&mut self, r: &Mat3) {
        self.inertia = r * self.inertia * r.transpose();
    }

    /// Combine with another distribution sharing the same centre of mass.
    pub fn add(&mut self, other: &Mass) {
        self.mass += other.mass;
        self.inertia += other.inertia;
    }

    /// Verify `mass > 0` and that the inertia tensor is finite, symmetric and
    /// positive definite.
    pub fn check(&self) -> Result<()> {
        if !(self.mass > 0.0) || !self.mass.is_finite() {
            return Err(LinalgError::InvalidMass(format!(
                "mass must be positive and finite, got {}",
                self.mass
            )));
        }
        if self.inertia.iter().any(|x| !x.is_finite()) {
            return Err(LinalgError::InvalidMass("inertia is not finite".into()));
        }
        let mut m = Matrix::zeros(3, 3);
        for i in 0..3 {
            for j in 0..3 {
                m[(i, j)] = self.inertia[(i, j)];
            }
        }
        let scale = self.inertia.diagonal().amax().max(f64::MIN_POSITIVE);
        if !m.is_symmetric(1e-9 * scale) {
            return Err(LinalgError::InvalidMass("inertia is not symmetric".into()));
        }
        Cholesky::factor(&m)
            .map(|_| ())
            .map_err(|_| LinalgError::InvalidMass("inertia is not positive definite".into()))
    }
}
