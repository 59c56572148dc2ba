//! Joint stops and motors along a single axis.

use serde::{Deserialize, Serialize};

use crate::row::{RowJacobian, RowWriter};

/// Adjustable joint parameters, addressed per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JointParam {
    /// Lower stop position.
    LoStop,
    /// Upper stop position.
    HiStop,
    /// Motor target velocity.
    Velocity,
    /// Maximum motor force (or torque). Zero disables the motor.
    FMax,
    /// Scale on the motor force while driving away from a stop.
    FudgeFactor,
    /// Restitution of the stops.
    Bounce,
    /// Error reduction at the stops.
    StopErp,
    /// Softness at the stops.
    StopCfm,
    /// Softness of the motor row.
    Cfm,
}

/// Where the joint coordinate sits relative to its stops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LimitState {
    /// Between the stops.
    Free,
    /// At or below the lower stop, by the given (non-positive) amount.
    AtLo(f64),
    /// At or above the upper stop, by the given (non-negative) amount.
    AtHi(f64),
}

/// Stops and motor for one joint axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitMotor {
    /// Lower stop.
    pub lo_stop: f64,
    /// Upper stop.
    pub hi_stop: f64,
    /// Motor target velocity.
    pub velocity: f64,
    /// Maximum motor force; the motor is off at zero.
    pub fmax: f64,
    /// Motor force scale while leaving a stop.
    pub fudge_factor: f64,
    /// Stop restitution.
    pub bounce: f64,
    /// Stop error reduction; `None` uses the world value.
    pub stop_erp: Option<f64>,
    /// Stop softness; `None` uses the world value.
    pub stop_cfm: Option<f64>,
    /// Motor softness; `None` uses the world value.
    pub normal_cfm: Option<f64>,
}

impl Default for LimitMotor {
    fn default() -> Self {
        Self {
            lo_stop: f64::NEG_INFINITY,
            hi_stop: f64::INFINITY,
            velocity: 0.0,
            fmax: 0.0,
            fudge_factor: 1.0,
            bounce: 0.0,
            stop_erp: None,
            stop_cfm: None,
            normal_cfm: None,
        }
    }
}

impl LimitMotor {
    /// Position of `pos` relative to the stops. Stops with `lo > hi` are
    /// ignored.
    pub fn limit_state(&self, pos: f64) -> LimitState {
        if self.lo_stop > self.hi_stop {
            LimitState::Free
        } else if pos <= self.lo_stop {
            LimitState::AtLo(pos - self.lo_stop)
        } else if pos >= self.hi_stop {
            LimitState::AtHi(pos - self.hi_stop)
        } else {
            LimitState::Free
        }
    }

    /// Whether this axis contributes a row at `pos`.
    pub fn is_active(&self, pos: f64) -> bool {
        self.fmax > 0.0 || self.limit_state(pos) != LimitState::Free
    }

    /// Append the stop or motor row for this axis. `rate` is the current
    /// value of `jac . v`.
    pub(crate) fn add_row(&self, w: &mut RowWriter<'_>, jac: RowJacobian, pos: f64, rate: f64) {
        let motor_cfm = self.normal_cfm.unwrap_or(w.cfm);
        let state = self.limit_state(pos);
        let leaving = match state {
            LimitState::Free => true,
            LimitState::AtLo(_) => self.velocity > 0.0 && self.lo_stop != self.hi_stop,
            LimitState::AtHi(_) => self.velocity < 0.0 && self.lo_stop != self.hi_stop,
        };
        if self.fmax > 0.0 && leaving {
            let f = if state == LimitState::Free {
                self.fmax
            } else {
                self.fmax * self.fudge_factor
            };
            w.bounded(jac, self.velocity, motor_cfm, -f, f);
            return;
        }

        let err = match state {
            LimitState::Free => return,
            LimitState::AtLo(e) | LimitState::AtHi(e) => e,
        };
        let k = self.stop_erp.unwrap_or(w.erp) / w.h();
        let mut rhs = -k * err;
        let (lo, hi) = if self.lo_stop == self.hi_stop {
            (f64::NEG_INFINITY, f64::INFINITY)
        } else if matches!(state, LimitState::AtLo(_)) {
            if self.bounce > 0.0 && rate < 0.0 {
                rhs = rhs.max(-self.bounce * rate);
            }
            (0.0, f64::INFINITY)
        } else {
            if self.bounce > 0.0 && rate > 0.0 {
                rhs = rhs.min(-self.bounce * rate);
            }
            (f64::NEG_INFINITY, 0.0)
        };
        let cfm = self.stop_cfm.unwrap_or(w.cfm);
        w.bounded(jac, rhs, cfm, lo, hi);
    }

    /// Set one parameter.
    pub fn set_param(&mut self, param: JointParam, value: f64) -> Result<(), String> {
        let non_negative = |name: &str| {
            if value >= 0.0 && !value.is_nan() {
                Ok(value)
            } else {
                Err(format!("{name} must be non-negative, got {value}"))
            }
        };
        match param {
            JointParam::LoStop => {
                if value.is_nan() {
                    return Err("lo_stop must not be NaN".into());
                }
                self.lo_stop = value;
            }
            JointParam::HiStop => {
                if value.is_nan() {
                    return Err("hi_stop must not be NaN".into());
                }
                self.hi_stop = value;
            }
            JointParam::Velocity => {
                if !value.is_finite() {
                    return Err(format!("motor velocity must be finite, got {value}"));
                }
                self.velocity = value;
            }
            JointParam::FMax => self.fmax = non_negative("fmax")?,
            JointParam::FudgeFactor => {
                if !(0.0..=1.0).contains(&value) {
                    return Err(format!("fudge_factor must be in [0, 1], got {value}"));
                }
                self.fudge_factor = value;
            }
            JointParam::Bounce => {
                if !(0.0..=1.0).contains(&value) {
                    return Err(format!("bounce must be in [0, 1], got {value}"));
                }
                self.bounce = value;
            }
            JointParam::StopErp => {
                if !(0.0..=1.0).contains(&value) {
                    return Err(format!("stop_erp must be in [0, 1], got {value}"));
                }
                self.stop_erp = Some(value);
            }
            JointParam::StopCfm => self.stop_cfm = Some(non_negative("stop_cfm")?),
            JointParam::Cfm => self.normal_cfm = Some(non_negative("cfm")?),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tumble_math::Vec3;

    fn writer(rows: &mut Vec<crate::row::ConstraintRow>) -> RowWriter<'_> {
        RowWriter::new(rows, Some(0), None, 0.01, 0.2, 1e-5).unwrap()
    }

    #[test]
    fn test_default_is_inactive() {
        let lm = LimitMotor::default();
        assert_eq!(lm.limit_state(1e6), LimitState::Free);
        assert!(!lm.is_active(0.0));
    }

    #[test]
    fn test_limit_state() {
        let lm = LimitMotor {
            lo_stop: -0.5,
            hi_stop: 0.5,
            ..Default::default()
        };
        assert_eq!(lm.limit_state(0.0), LimitState::Free);
        assert_eq!(lm.limit_state(-0.75), LimitState::AtLo(-0.25));
        assert_eq!(lm.limit_state(0.75), LimitState::AtHi(0.25));
        let inverted = LimitMotor {
            lo_stop: 1.0,
            hi_stop: -1.0,
            ..Default::default()
        };
        assert_eq!(inverted.limit_state(5.0), LimitState::Free);
    }

    #[test]
    fn test_motor_row() {
        let lm = LimitMotor {
            velocity: 2.0,
            fmax: 10.0,
            ..Default::default()
        };
        let mut rows = Vec::new();
        lm.add_row(&mut writer(&mut rows), RowJacobian::angular(Vec3::z()), 0.0, 0.0);
        assert_eq!(rows.len(), 1);
        assert!((rows[0].rhs - 2.0).abs() < 1e-12);
        assert!((rows[0].hi - 0.1).abs() < 1e-12);
        assert!((rows[0].lo + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_lower_stop_row_pushes_back() {
        let lm = LimitMotor {
            lo_stop: 0.0,
            hi_stop: 1.0,
            stop_erp: Some(0.5),
            ..Default::default()
        };
        let mut rows = Vec::new();
        lm.add_row(&mut writer(&mut rows), RowJacobian::linear(Vec3::x()), -0.02, 0.0);
        assert_eq!(rows.len(), 1);
        // k = 0.5 / 0.01 = 50, error -0.02.
        assert!((rows[0].rhs - 1.0).abs() < 1e-12);
        assert_eq!(rows[0].lo, 0.0);
        assert_eq!(rows[0].hi, f64::INFINITY);
    }

    #[test]
    fn test_upper_stop_bounce() {
        let lm = LimitMotor {
            lo_stop: 0.0,
            hi_stop: 1.0,
            bounce: 0.5,
            ..Default::default()
        };
        let mut rows = Vec::new();
        lm.add_row(&mut writer(&mut rows), RowJacobian::linear(Vec3::x()), 1.0, 4.0);
        assert!((rows[0].rhs + 2.0).abs() < 1e-12);
        assert_eq!(rows[0].hi, 0.0);
    }

    #[test]
    fn test_motor_leaving_stop_uses_fudge() {
        let lm = LimitMotor {
            lo_stop: 0.0,
            hi_stop: 1.0,
            velocity: 1.0,
            fmax: 10.0,
            fudge_factor: 0.5,
            ..Default::default()
        };
        let mut rows = Vec::new();
        lm.add_row(&mut writer(&mut rows), RowJacobian::linear(Vec3::x()), -0.1, 0.0);
        assert!((rows[0].rhs - 1.0).abs() < 1e-12);
        assert!((rows[0].hi - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_set_param_validation() {
        let mut lm = LimitMotor::default();
        assert!(lm.set_param(JointParam::FMax, -1.0).is_err());
        assert!(lm.set_param(JointParam::Bounce, 2.0).is_err());
        assert!(lm.set_param(JointParam::LoStop, f64::NAN).is_err());
        lm.set_param(JointParam::FMax, 3.0).unwrap();
        lm.set_param(JointParam::StopErp, 0.9).unwrap();
        assert_eq!(lm.fmax, 3.0);
        assert_eq!(lm.stop_erp, Some(0.9));
    }
}
