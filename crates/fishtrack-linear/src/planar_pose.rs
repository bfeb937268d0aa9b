use crate::math::nearest_rotation;
use fishtrack_core::{Iso3, Mat3};
use nalgebra::{Rotation3, Translation3, UnitQuaternion};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum PlanarPoseError {
    #[error("calibration matrix is singular")]
    SingularK,
    #[error("homography columns are degenerate")]
    Degenerate,
}

/// Decompose a plane-to-image homography into the board pose `T_cam_board`.
///
/// The board lies on `Z = 0` in its own frame. The sign of the scale is
/// chosen so the board sits in front of the camera.
pub fn pose_from_homography(k: &Mat3, h: &Mat3) -> Result<Iso3, PlanarPoseError> {
    let k_inv = k.try_inverse().ok_or(PlanarPoseError::SingularK)?;

    let a1 = k_inv * h.column(0);
    let a2 = k_inv * h.column(1);
    let a3 = k_inv * h.column(2);

    let norm = 0.5 * (a1.norm() + a2.norm());
    if norm <= f64::EPSILON {
        return Err(PlanarPoseError::Degenerate);
    }
    let mut lambda = 1.0 / norm;
    if a3.z * lambda < 0.0 {
        lambda = -lambda;
    }

    let r1 = a1 * lambda;
    let r2 = a2 * lambda;
    let r3 = r1.cross(&r2);
    let r = Mat3::from_columns(&[r1, r2, r3]);
    let r = nearest_rotation(&r).ok_or(PlanarPoseError::Degenerate)?;

    let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r));
    Ok(Iso3::from_parts(Translation3::from(a3 * lambda), rotation))
}
