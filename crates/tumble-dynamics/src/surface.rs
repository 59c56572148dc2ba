//! Contact surface parameters and their per-pair combination.

use serde::{Deserialize, Serialize};
use tumble_math::Vec3;

/// Restitution applied to the normal row of a contact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounce {
    /// Fraction of the approach speed returned as separation speed (0..=1).
    pub restitution: f64,
    /// Approach speed below which no bounce happens.
    pub min_velocity: f64,
}

/// Friction, restitution and softness for a contact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceParams {
    /// Coulomb friction coefficient along the first tangent.
    /// Zero gives a frictionless contact, infinity unbounded friction.
    pub mu: f64,
    /// Coefficient along the second tangent; `None` uses `mu` for both.
    pub mu2: Option<f64>,
    /// Restitution, if any.
    pub bounce: Option<Bounce>,
    /// Error reduction for the normal row, overriding the world value.
    pub soft_erp: Option<f64>,
    /// Constraint force mixing for the normal row, overriding the world value.
    pub soft_cfm: Option<f64>,
    /// Force-dependent slip along the first tangent.
    pub slip1: f64,
    /// Force-dependent slip along the second tangent.
    pub slip2: f64,
    /// World-frame first friction direction. Projected onto the contact plane.
    pub friction_dir1: Option<Vec3>,
}

impl Default for SurfaceParams {
    fn default() -> Self {
        Self {
            mu: 1.0,
            mu2: None,
            bounce: None,
            soft_erp: None,
            soft_cfm: None,
            slip1: 0.0,
            slip2: 0.0,
            friction_dir1: None,
        }
    }
}

impl SurfaceParams {
    /// Frictionless surface.
    #[must_use]
    pub fn frictionless() -> Self {
        Self {
            mu: 0.0,
            ..Default::default()
        }
    }

    /// Set the friction coefficient.
    #[must_use]
    pub fn with_mu(mut self, mu: f64) -> Self {
        self.mu = mu;
        self
    }

    /// Set restitution.
    #[must_use]
    pub fn with_bounce(mut self, restitution: f64, min_velocity: f64) -> Self {
        self.bounce = Some(Bounce {
            restitution,
            min_velocity,
        });
        self
    }

    /// Set contact softness.
    #[must_use]
    pub fn with_softness(mut self, erp: f64, cfm: f64) -> Self {
        self.soft_erp = Some(erp);
        self.soft_cfm = Some(cfm);
        self
    }

    /// Whether the two tangent directions carry different coefficients.
    pub fn is_anisotropic(&self) -> bool {
        self.mu2.is_some()
    }

    /// Coefficient along the second tangent.
    pub fn mu2_or_mu(&self) -> f64 {
        self.mu2.unwrap_or(self.mu)
    }

    /// Combine the surfaces of two touching geoms.
    ///
    /// Friction is the geometric mean, restitution and softness take the
    /// larger value, and the first friction direction comes from `a` when set.
    pub fn combine(a: &SurfaceParams, b: &SurfaceParams) -> SurfaceParams {
        let mu2 = match (a.mu2, b.mu2) {
            (None, None) => None,
            _ => Some(mean_friction(a.mu2_or_mu(), b.mu2_or_mu())),
        };
        let bounce = match (a.bounce, b.bounce) {
            (Some(x), Some(y)) => Some(if y.restitution > x.restitution { y } else { x }),
            (x, y) => x.or(y),
        };
        SurfaceParams {
            mu: mean_friction(a.mu, b.mu),
            mu2,
            bounce,
            soft_erp: max_opt(a.soft_erp, b.soft_erp),
            soft_cfm: max_opt(a.soft_cfm, b.soft_cfm),
            slip1: a.slip1.max(b.slip1),
            slip2: a.slip2.max(b.slip2),
            friction_dir1: a.friction_dir1.or(b.friction_dir1),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if !(self.mu >= 0.0) || self.mu2.is_some_and(|m| !(m >= 0.0)) {
            return Err("friction coefficients must be non-negative".into());
        }
        if let Some(b) = self.bounce {
            if !(0.0..=1.0).contains(&b.restitution) || !(b.min_velocity >= 0.0) {
                return Err("bounce restitution must be in [0, 1] with min_velocity >= 0".into());
            }
        }
        if self.soft_erp.is_some_and(|e| !(0.0..=1.0).contains(&e)) {
            return Err("soft_erp must be in [0, 1]".into());
        }
        if self.soft_cfm.is_some_and(|c| !(c >= 0.0) || !c.is_finite()) {
            return Err("soft_cfm must be a non-negative finite value".into());
        }
        if !(self.slip1 >= 0.0) || !(self.slip2 >= 0.0) {
            return Err("slip must be non-negative".into());
        }
        Ok(())
    }
}

fn mean_friction(a: f64, b: f64) -> f64 {
    // Zero wins over infinity: sqrt(0 * inf) is NaN.
    if a == 0.0 || b == 0.0 {
        0.0
    } else {
        (a * b).sqrt()
    }
}

fn max_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    }
}
