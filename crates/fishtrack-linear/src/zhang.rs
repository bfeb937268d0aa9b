use crate::math::smallest_right_singular_vector;
use fishtrack_core::{CameraIntrinsics, Mat3, Real};
use log::debug;
use nalgebra::{DMatrix, SVector};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum IntrinsicsInitError {
    #[error("need at least 3 homographies, got {0}")]
    NotEnoughViews(usize),
    #[error("degenerate view configuration")]
    Degenerate,
    #[error("image of the absolute conic is not positive definite")]
    NotPositiveDefinite,
    #[error("svd failed")]
    SvdFailed,
}

/// Row vector `v_ij` built from columns `i` and `j` of a plane homography.
fn v_ij(h: &Mat3, i: usize, j: usize) -> SVector<Real, 6> {
    let hi = h.column(i);
    let hj = h.column(j);

    SVector::<Real, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

/// Closed-form intrinsics from plane homographies (Zhang), ignoring distortion.
pub fn intrinsics_from_homographies(
    homographies: &[Mat3],
) -> Result<CameraIntrinsics, IntrinsicsInitError> {
    let m = homographies.len();
    if m < 3 {
        return Err(IntrinsicsInitError::NotEnoughViews(m));
    }

    let mut v = DMatrix::<Real>::zeros(2 * m, 6);
    for (k, h) in homographies.iter().enumerate() {
        // Scale each homography to unit norm so no single view dominates.
        let h = h / h.norm();
        let v11 = v_ij(&h, 0, 0);
        let v22 = v_ij(&h, 1, 1);
        let v12 = v_ij(&h, 0, 1);

        v.row_mut(2 * k).copy_from(&v12.transpose());
        v.row_mut(2 * k + 1).copy_from(&(v11 - v22).transpose());
    }

    let b = smallest_right_singular_vector(&v).ok_or(IntrinsicsInitError::SvdFailed)?;
    let (b11, b12, b22, b13, b23, b33) = (b[0], b[1], b[2], b[3], b[4], b[5]);

    let denom = b11 * b22 - b12 * b12;
    let denom_norm = b11 * b11 + b22 * b22;
    if denom_norm <= 0.0 || denom.abs() / denom_norm <= 1e-9 {
        return Err(IntrinsicsInitError::Degenerate);
    }

    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;

    if lambda.signum() != b11.signum() || denom.signum() != b11.signum() * b11.signum() {
        return Err(IntrinsicsInitError::NotPositiveDefinite);
    }

    let alpha = (lambda / b11).sqrt();
    let beta = (lambda * b11 / denom).sqrt();
    let gamma = -b12 * alpha * alpha * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    if !(alpha.is_finite() && beta.is_finite() && u0.is_finite() && v0.is_finite()) {
        return Err(IntrinsicsInitError::Degenerate);
    }
    debug!("zhang init from {m} views: fx {alpha:.2}, fy {beta:.2}, cx {u0:.2}, cy {v0:.2}");

    Ok(CameraIntrinsics {
        fx: alpha,
        fy: beta,
        cx: u0,
        cy: v0,
        skew: gamma,
    })
}
