//! Quaternion and rotation-matrix conversions.
//!
//! Quaternions are `(w, i, j, k)` with `w` the scalar part.

use nalgebra::Quaternion;

use crate::{Mat3, Quat, Vec3};

/// Rotation matrix of a (not necessarily unit) quaternion.
///
/// The quaternion is assumed to be close to unit length; no normalization is
/// performed.
pub fn quat_to_matrix(q: &Quaternion<f64>) -> Mat3 {
    let (w, x, y, z) = (q.w, q.i, q.j, q.k);
    let (xx, yy, zz) = (x * x, y * y, z * z);
    let (xy, xz, yz) = (x * y, x * z, y * z);
    let (wx, wy, wz) = (w * x, w * y, w * z);
    Mat3::new(
        1.0 - 2.0 * (yy + zz),
        2.0 * (xy - wz),
        2.0 * (xz + wy),
        2.0 * (xy + wz),
        1.0 - 2.0 * (xx + zz),
        2.0 * (yz - wx),
        2.0 * (xz - wy),
        2.0 * (yz + wx),
        1.0 - 2.0 * (xx + yy),
    )
}

/// Quaternion of an orthonormal rotation matrix.
///
/// When the trace is negative the largest diagonal element selects which
/// component is recovered first, avoiding cancellation in the square root.
pub fn matrix_to_quat(r: &Mat3) -> Quaternion<f64> {
    let tr = r[(0, 0)] + r[(1, 1)] + r[(2, 2)];
    if tr >= 0.0 {
        let s = (tr + 1.0).sqrt();
        let w = 0.5 * s;
        let s = 0.5 / s;
        return Quaternion::new(
            w,
            (r[(2, 1)] - r[(1, 2)]) * s,
            (r[(0, 2)] - r[(2, 0)]) * s,
            (r[(1, 0)] - r[(0, 1)]) * s,
        );
    }

    // Pick the largest diagonal term.
    let mut i = 0;
    if r[(1, 1)] > r[(0, 0)] {
        i = 1;
    }
    if r[(2, 2)] > r[(i, i)] {
        i = 2;
    }
    match i {
        0 => {
            let s = (r[(0, 0)] - (r[(1, 1)] + r[(2, 2)]) + 1.0).sqrt();
            let x = 0.5 * s;
            let s = 0.5 / s;
            Quaternion::new(
                (r[(2, 1)] - r[(1, 2)]) * s,
                x,
                (r[(0, 1)] + r[(1, 0)]) * s,
                (r[(2, 0)] + r[(0, 2)]) * s,
            )
        }
        1 => {
            let s = (r[(1, 1)] - (r[(2, 2)] + r[(0, 0)]) + 1.0).sqrt();
            let y = 0.5 * s;
            let s = 0.5 / s;
            Quaternion::new(
                (r[(0, 2)] - r[(2, 0)]) * s,
                (r[(0, 1)] + r[(1, 0)]) * s,
                y,
                (r[(1, 2)] + r[(2, 1)]) * s,
            )
        }
        _ => {
            let s = (r[(2, 2)] - (r[(0, 0)] + r[(1, 1)]) + 1.0).sqrt();
            let z = 0.5 * s;
            let s = 0.5 / s;
            Quaternion::new(
                (r[(1, 0)] - r[(0, 1)]) * s,
                (r[(2, 0)] + r[(0, 2)]) * s,
                (r[(1, 2)] + r[(2, 1)]) * s,
                z,
            )
        }
    }
}

/// Deviation of `|q|` from one.
pub fn norm_drift(q: &Quaternion<f64>) -> f64 {
    (q.norm() - 1.0).abs()
}

/// Bring a quaternion back to unit length.
///
/// Returns `None` for zero-length or non-finite input, which cannot be
/// repaired by scaling.
pub fn renormalize(q: &Quaternion<f64>) -> Option<Quat> {
    let n = q.norm();
    if !n.is_finite() || n < 1e-12 || !q.coords.iter().all(|c| c.is_finite()) {
        return None;
    }
    Some(Quat::new_unchecked(*q / n))
}

/// Advance an orientation by angular velocity `w` (world frame) over `dt`
/// with the first-order update `q += dt/2 * (0, w) * q`. The result is not
/// normalized.
pub fn integrate_first_order(q: &Quat, w: &Vec3, dt: f64) -> Quaternion<f64> {
    let q = *q.quaternion();
    let wq = Quaternion::new(0.0, w.x, w.y, w.z) * q;
    q + wq * (0.5 * dt)
}

/// Advance an orientation by the exact rotation of angle `|w| dt` about `w`.
pub fn integrate_finite(q: &Quat, w: &Vec3, dt: f64) -> Quaternion<f64> {
    let wlen = w.norm();
    let h = 0.5 * wlen * dt;
    let (s, c) = h.sin_cos();
    // sinc(h) * dt / 2 keeps the small-angle limit finite.
    let k = if h.abs() < 1e-4 {
        0.5 * dt * (1.0 - h * h / 6.0)
    } else {
        s / wlen
    };
    let dq = Quaternion::new(c, w.x * k, w.y * k, w.z * k);
    dq * *q.quaternion()
}

/// Orthonormal pair `(p, q)` spanning the plane perpendicular to `n`.
pub fn plane_space(n: &Vec3) -> (Vec3, Vec3) {
    if n.z.abs() > std::f64::consts::FRAC_1_SQRT_2 {
        // Choose p in the y-z plane.
        let a = n.y * n.y + n.z * n.z;
        let k = 1.0 / a.sqrt();
        let p = Vec3::new(0.0, -n.z * k, n.y * k);
        let q = Vec3::new(a * k, -n.x * p.z, n.x * p.y);
        (p, q)
    } else {
        // Choose p in the x-y plane.
        let a = n.x * n.x + n.y * n.y;
        let k = 1.0 / a.sqrt();
        let p = Vec3::new(-n.y * k, n.x * k, 0.0);
        let q = Vec3::new(-n.z * p.y, n.z * p.x, a * k);
        (p, q)
    }
}

/// Cross-product matrix: `skew(a) * b == a.cross(&b)`.
pub fn skew(a: &Vec3) -> Mat3 {
    Mat3::new(0.0, -a.z, a.y, a.z, 0.0, -a.x, -a.y, a.x, 0.0)
}
