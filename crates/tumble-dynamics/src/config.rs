//! World, solver and contact configuration.
//!
//! Configuration is plain data with serde support so callers can load it
//! from any format. The stepper copies the configuration at the start of
//! each step; changes made between steps apply to the next one.

use serde::{Deserialize, Serialize};
use tumble_collide::ContactLimits;
use tumble_math::Vec3;

use crate::error::{PhysicsError, Result};
use crate::surface::SurfaceParams;

/// How the constraint system is solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverMethod {
    /// Cholesky for equality-only systems, projected Gauss-Seidel otherwise.
    #[default]
    Auto,
    /// Always projected Gauss-Seidel with over-relaxation.
    Iterative,
    /// Cholesky for equality-only systems, pivoting active-set otherwise.
    Direct,
}

/// Constraint solver parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Solution method.
    pub method: SolverMethod,
    /// Projected Gauss-Seidel sweeps.
    pub iterations: usize,
    /// Successive over-relaxation factor.
    pub sor_w: f64,
    /// Relative diagonal term added when a direct factorization fails.
    pub regularization: f64,
    /// Pivot budget for the active-set path; `None` means four per row.
    pub max_pivots: Option<usize>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            method: SolverMethod::Auto,
            iterations: 20,
            sor_w: 1.3,
            regularization: 1e-8,
            max_pivots: None,
        }
    }
}

/// Contact generation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    /// Contacts kept per geom pair.
    pub max_contacts: usize,
    /// Candidates gathered from a mesh pair before reduction.
    pub batch_limit: usize,
    /// Cap on the separation speed used to correct penetration.
    pub max_correcting_vel: f64,
    /// Penetration allowed before correction starts.
    pub surface_layer: f64,
    /// Surface used for geoms without their own.
    pub default_surface: SurfaceParams,
}

impl Default for ContactConfig {
    fn default() -> Self {
        let limits = ContactLimits::default();
        Self {
            max_contacts: limits.max_contacts,
            batch_limit: limits.batch_limit,
            max_correcting_vel: f64::INFINITY,
            surface_layer: 0.0,
            default_surface: SurfaceParams::default(),
        }
    }
}

impl ContactConfig {
    /// Narrow-phase limits.
    pub fn limits(&self) -> ContactLimits {
        ContactLimits {
            max_contacts: self.max_contacts,
            batch_limit: self.batch_limit,
        }
    }
}

/// Automatic sleeping of idle bodies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoDisableConfig {
    /// Whether bodies go to sleep automatically.
    pub enabled: bool,
    /// Linear speed below which a body counts as idle.
    pub linear_threshold: f64,
    /// Angular speed below which a body counts as idle.
    pub angular_threshold: f64,
    /// Consecutive idle steps before a body is disabled.
    pub idle_steps: u32,
}

impl Default for AutoDisableConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            linear_threshold: 0.01,
            angular_threshold: 0.01,
            idle_steps: 10,
        }
    }
}

/// World-level simulation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Gravity acceleration (m/s^2).
    pub gravity: [f64; 3],
    /// Global error reduction parameter (0..=1).
    pub erp: f64,
    /// Global constraint force mixing (softness).
    pub cfm: f64,
    /// Fixed timestep used by [`World::step_default`](crate::World::step_default).
    pub timestep: f64,
    /// Constraint solver parameters.
    pub solver: SolverConfig,
    /// Contact generation parameters.
    pub contact: ContactConfig,
    /// Automatic sleeping.
    pub auto_disable: AutoDisableConfig,
    /// Quaternion norm drift tolerated before renormalization.
    pub quaternion_tolerance: f64,
    /// Record per-stage timings in [`StepStats`](crate::StepStats).
    pub record_timings: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, 0.0, -9.81],
            erp: 0.2,
            cfm: 1e-5,
            timestep: 0.01,
            solver: SolverConfig::default(),
            contact: ContactConfig::default(),
            auto_disable: AutoDisableConfig::default(),
            quaternion_tolerance: 1e-6,
            record_timings: false,
        }
    }
}

impl WorldConfig {
    /// Config without gravity.
    #[must_use]
    pub fn zero_gravity() -> Self {
        Self {
            gravity: [0.0; 3],
            ..Default::default()
        }
    }

    /// Set gravity.
    #[must_use]
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity.into();
        self
    }

    /// Set the global error reduction and softness.
    #[must_use]
    pub fn with_erp_cfm(mut self, erp: f64, cfm: f64) -> Self {
        self.erp = erp;
        self.cfm = cfm;
        self
    }

    /// Set the solver method.
    #[must_use]
    pub fn with_solver(mut self, method: SolverMethod) -> Self {
        self.solver.method = method;
        self
    }

    /// Enable automatic sleeping with the default thresholds.
    #[must_use]
    pub fn with_auto_disable(mut self, enabled: bool) -> Self {
        self.auto_disable.enabled = enabled;
        self
    }

    /// Gravity as a vector.
    pub fn gravity_vec(&self) -> Vec3 {
        Vec3::from(self.gravity)
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(invalid("gravity must be finite"));
        }
        if !(0.0..=1.0).contains(&self.erp) {
            return Err(invalid("erp must be between 0 and 1"));
        }
        if !(self.cfm >= 0.0) || !self.cfm.is_finite() {
            return Err(invalid("cfm must be a non-negative finite value"));
        }
        if !(self.timestep > 0.0) || !self.timestep.is_finite() {
            return Err(invalid("timestep must be positive"));
        }
        if self.solver.iterations == 0 {
            return Err(invalid("solver iterations must be at least 1"));
        }
        if !(self.solver.sor_w > 0.0 && self.solver.sor_w < 2.0) {
            return Err(invalid("sor_w must be in (0, 2)"));
        }
        if !(self.solver.regularization > 0.0) || !self.solver.regularization.is_finite() {
            return Err(invalid("regularization must be positive"));
        }
        if self.contact.max_contacts == 0 || self.contact.batch_limit == 0 {
            return Err(invalid("contact limits must be at least 1"));
        }
        if !(self.contact.max_correcting_vel > 0.0) {
            return Err(invalid("max_correcting_vel must be positive"));
        }
        if !(self.contact.surface_layer >= 0.0) || !self.contact.surface_layer.is_finite() {
            return Err(invalid("surface_layer must be a non-negative finite value"));
        }
        self.contact.default_surface.validate().map_err(PhysicsError::InvalidConfig)?;
        let ad = &self.auto_disable;
        if !(ad.linear_threshold >= 0.0) || !(ad.angular_threshold >= 0.0) {
            return Err(invalid("auto-disable thresholds must be non-negative"));
        }
        if ad.enabled && ad.idle_steps == 0 {
            return Err(invalid("auto-disable idle_steps must be at least 1"));
        }
        if !(self.quaternion_tolerance > 0.0) {
            return Err(invalid("quaternion_tolerance must be positive"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> PhysicsError {
    PhysicsError::InvalidConfig(msg.into())
}
