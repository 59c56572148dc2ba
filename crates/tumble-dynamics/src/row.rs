//! Constraint rows: the uniform unit consumed by the solver.
//!
//! Joints and contacts describe each scalar constraint with a Jacobian over
//! the linear and angular velocity of one or two bodies. The solver works in
//! impulse units: `cfm` is already divided by the step size and `lo`/`hi`
//! are multiplied by it, so `(J M^-1 J^T + cfm) lambda = rhs - J v`.

use tumble_math::Vec3;

/// One scalar constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintRow {
    /// Index of the first body in the solver's body list.
    pub body1: usize,
    /// Index of the second body, `None` when it is static or the world.
    pub body2: Option<usize>,
    /// Jacobian against the first body's linear velocity.
    pub j1_lin: Vec3,
    /// Jacobian against the first body's angular velocity.
    pub j1_ang: Vec3,
    /// Jacobian against the second body's linear velocity.
    pub j2_lin: Vec3,
    /// Jacobian against the second body's angular velocity.
    pub j2_ang: Vec3,
    /// Target constraint velocity after the step.
    pub rhs: f64,
    /// Diagonal softness in impulse units.
    pub cfm: f64,
    /// Lower impulse bound, or minus the friction coefficient with `findex`.
    pub lo: f64,
    /// Upper impulse bound, or the friction coefficient with `findex`.
    pub hi: f64,
    /// Row whose impulse scales the bounds (friction).
    pub findex: Option<usize>,
}

/// Linear and angular velocity of a body.
pub type Velocity = (Vec3, Vec3);

impl ConstraintRow {
    /// Whether the row has any bound.
    pub fn is_bounded(&self) -> bool {
        self.findex.is_some() || self.lo > f64::NEG_INFINITY || self.hi < f64::INFINITY
    }

    /// Impulse bounds given the current impulses.
    #[inline]
    pub fn bounds(&self, lambda: &[f64]) -> (f64, f64) {
        match self.findex {
            Some(f) => {
                let n = lambda[f].abs();
                (self.lo * n, self.hi * n)
            }
            None => (self.lo, self.hi),
        }
    }

    /// `J v` for the given body velocities.
    #[inline]
    pub fn jv(&self, vel: &[Velocity]) -> f64 {
        let (v1, w1) = &vel[self.body1];
        let mut s = self.j1_lin.dot(v1) + self.j1_ang.dot(w1);
        if let Some(b2) = self.body2 {
            let (v2, w2) = &vel[b2];
            s += self.j2_lin.dot(v2) + self.j2_ang.dot(w2);
        }
        s
    }
}

/// Jacobian of a row before body slots are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RowJacobian {
    /// First body, linear.
    pub lin1: Vec3,
    /// First body, angular.
    pub ang1: Vec3,
    /// Second body, linear.
    pub lin2: Vec3,
    /// Second body, angular.
    pub ang2: Vec3,
}

impl RowJacobian {
    /// Pure angular row: `axis . (w1 - w2)`.
    pub fn angular(axis: Vec3) -> Self {
        Self {
            ang1: axis,
            ang2: -axis,
            ..Default::default()
        }
    }

    /// Pure linear row: `axis . (v1 - v2)`.
    pub fn linear(axis: Vec3) -> Self {
        Self {
            lin1: axis,
            lin2: -axis,
            ..Default::default()
        }
    }
}

/// Appends rows for one constraint, mapping its two ends onto solver slots.
///
/// An end that is not simulated this step (world, static or disabled) has
/// its Jacobian dropped. When only the second end is simulated it moves
/// into the first slot.
#[derive(Debug)]
pub struct RowWriter<'a> {
    rows: &'a mut Vec<ConstraintRow>,
    slot1: usize,
    slot2: Option<usize>,
    swapped: bool,
    h: f64,
    /// Error reduction for this constraint.
    pub erp: f64,
    /// Constraint force mixing for this constraint.
    pub cfm: f64,
}

impl<'a> RowWriter<'a> {
    /// Writer for a constraint between `slot1` and `slot2`. `None` when
    /// neither end is simulated.
    pub fn new(
        rows: &'a mut Vec<ConstraintRow>,
        slot1: Option<usize>,
        slot2: Option<usize>,
        h: f64,
        erp: f64,
        cfm: f64,
    ) -> Option<Self> {
        let (slot1, slot2, swapped) = match (slot1, slot2) {
            (Some(a), b) => (a, b, false),
            (None, Some(b)) => (b, None, true),
            (None, None) => return None,
        };
        Some(Self {
            rows,
            slot1,
            slot2,
            swapped,
            h,
            erp,
            cfm,
        })
    }

    /// Whether the ends were swapped.
    pub fn swapped(&self) -> bool {
        self.swapped
    }

    /// Step size.
    pub fn h(&self) -> f64 {
        self.h
    }

    /// Error correction gain `erp / h`.
    pub fn k(&self) -> f64 {
        self.erp / self.h
    }

    /// Append an equality row driving the constraint velocity to `rhs`.
    pub fn equality(&mut self, jac: RowJacobian, rhs: f64) -> usize {
        let cfm = self.cfm;
        self.push(jac, rhs, cfm, f64::NEG_INFINITY, f64::INFINITY, None)
    }

    /// Append a row with force bounds `lo..=hi` and explicit softness.
    pub fn bounded(&mut self, jac: RowJacobian, rhs: f64, cfm: f64, lo: f64, hi: f64) -> usize {
        self.push(jac, rhs, cfm, lo * self.h, hi * self.h, None)
    }

    /// Append a friction row bounded by `mu` times the impulse of `normal`.
    /// An infinite `mu` gives an unbounded row.
    pub fn friction(&mut self, jac: RowJacobian, cfm: f64, mu: f64, normal: usize) -> usize {
        if mu.is_infinite() {
            self.push(jac, 0.0, cfm, f64::NEG_INFINITY, f64::INFINITY, None)
        } else {
            self.push(jac, 0.0, cfm, -mu, mu, Some(normal))
        }
    }

    fn push(
        &mut self,
        jac: RowJacobian,
        rhs: f64,
        cfm: f64,
        lo: f64,
        hi: f64,
        findex: Option<usize>,
    ) -> usize {
        let (j1_lin, j1_ang, j2_lin, j2_ang) = if self.swapped {
            (jac.lin2, jac.ang2, Vec3::zeros(), Vec3::zeros())
        } else if self.slot2.is_some() {
            (jac.lin1, jac.ang1, jac.lin2, jac.ang2)
        } else {
            (jac.lin1, jac.ang1, Vec3::zeros(), Vec3::zeros())
        };
        self.rows.push(ConstraintRow {
            body1: self.slot1,
            body2: self.slot2,
            j1_lin,
            j1_ang,
            j2_lin,
            j2_ang,
            rhs,
            cfm: cfm / self.h,
            lo,
            hi,
            findex,
        });
        self.rows.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_scales_to_impulse_units() {
        let mut rows = Vec::new();
        let mut w = RowWriter::new(&mut rows, Some(0), Some(1), 0.01, 0.2, 1e-5).unwrap();
        assert!((w.k() - 20.0).abs() < 1e-12);
        w.bounded(RowJacobian::angular(Vec3::x()), 1.0, 1e-4, -5.0, 5.0);
        let r = rows[0];
        assert!((r.cfm - 1e-2).abs() < 1e-15);
        assert!((r.hi - 0.05).abs() < 1e-15);
        assert!((r.lo + 0.05).abs() < 1e-15);
        assert_eq!(r.j2_ang, -Vec3::x());
        assert!(r.is_bounded());
    }

    #[test]
    fn test_writer_moves_second_end_into_first_slot() {
        let mut rows = Vec::new();
        let mut w = RowWriter::new(&mut rows, None, Some(3), 0.01, 0.2, 0.0).unwrap();
        assert!(w.swapped());
        w.equality(RowJacobian::linear(Vec3::z()), 0.0);
        let r = rows[0];
        assert_eq!(r.body1, 3);
        assert_eq!(r.body2, None);
        assert_eq!(r.j1_lin, -Vec3::z());
        assert!(!r.is_bounded());
    }

    #[test]
    fn test_writer_drops_missing_second_end() {
        let mut rows = Vec::new();
        let mut w = RowWriter::new(&mut rows, Some(2), None, 0.01, 0.2, 0.0).unwrap();
        w.equality(RowJacobian::linear(Vec3::z()), 0.0);
        assert_eq!(rows[0].j2_lin, Vec3::zeros());
        assert!(RowWriter::new(&mut rows, None, None, 0.01, 0.2, 0.0).is_none());
    }

    #[test]
    fn test_friction_bounds_follow_normal_impulse() {
        let mut rows = Vec::new();
        let mut w = RowWriter::new(&mut rows, Some(0), None, 0.01, 0.2, 0.0).unwrap();
        let n = w.bounded(RowJacobian::linear(Vec3::z()), 0.0, 0.0, 0.0, f64::INFINITY);
        let f = w.friction(RowJacobian::linear(Vec3::x()), 0.0, 0.5, n);
        let lambda = [2.0, 0.0];
        assert_eq!(rows[f].bounds(&lambda), (-1.0, 1.0));
        assert_eq!(rows[n].bounds(&lambda), (0.0, f64::INFINITY));
    }

    #[test]
    fn test_jv() {
        let mut rows = Vec::new();
        let mut w = RowWriter::new(&mut rows, Some(0), Some(1), 0.01, 0.2, 0.0).unwrap();
        w.equality(RowJacobian::linear(Vec3::x()), 0.0);
        let vel = [
            (Vec3::new(3.0, 0.0, 0.0), Vec3::zeros()),
            (Vec3::new(1.0, 0.0, 0.0), Vec3::zeros()),
        ];
        assert!((rows[0].jv(&vel) - 2.0).abs() < 1e-12);
    }
}
