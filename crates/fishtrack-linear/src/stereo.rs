//! Two-camera relative pose initialisation and epipolar geometry.

use anyhow::{bail, Result};
use fishtrack_core::{cross_matrix, Iso3, Mat3, Real, Vec3};
use log::debug;
use nalgebra::{Quaternion, Translation3, UnitQuaternion, Vector4};

/// Average a set of rigid transforms.
///
/// Translations are averaged arithmetically, rotations in quaternion space
/// after flipping every quaternion into the hemisphere of the first one.
pub fn average_isometries(poses: &[Iso3]) -> Result<Iso3> {
    let Some(first) = poses.first() else {
        bail!("cannot average an empty set of poses");
    };

    let n = poses.len() as Real;
    let t_avg = poses
        .iter()
        .fold(Vec3::zeros(), |acc, iso| acc + iso.translation.vector)
        / n;

    let q0 = first.rotation.coords;
    let acc = poses.iter().fold(Vector4::<Real>::zeros(), |acc, iso| {
        let q = iso.rotation.coords;
        if q0.dot(&q) < 0.0 {
            acc - q
        } else {
            acc + q
        }
    });

    let rotation = if acc.norm_squared() == 0.0 {
        UnitQuaternion::identity()
    } else {
        UnitQuaternion::from_quaternion(Quaternion::from_vector(acc / n))
    };

    Ok(Iso3::from_parts(Translation3::from(t_avg), rotation))
}

/// Initial `T_secondary_primary` from per-view board poses seen by both cameras.
///
/// Each view contributes `T_s_b * T_p_b^{-1}`; the candidates are averaged.
pub fn relative_pose_from_board_poses(primary: &[Iso3], secondary: &[Iso3]) -> Result<Iso3> {
    if primary.len() != secondary.len() {
        bail!(
            "pose counts differ: {} primary vs {} secondary",
            primary.len(),
            secondary.len()
        );
    }
    let candidates: Vec<Iso3> = primary
        .iter()
        .zip(secondary)
        .map(|(p, s)| s * p.inverse())
        .collect();
    let average = average_isometries(&candidates)?;
    let spread = candidates
        .iter()
        .map(|c| c.rotation.angle_to(&average.rotation))
        .fold(0.0, Real::max);
    debug!(
        "relative pose from {} views: baseline {:.4}, max rotation spread {:.3} deg",
        candidates.len(),
        average.translation.vector.norm(),
        spread.to_degrees()
    );
    Ok(average)
}

/// Essential matrix `E = [t]_x R` for `x_s^T E x_p = 0` on normalized coordinates.
pub fn essential_matrix(r: &Mat3, t: &Vec3) -> Mat3 {
    cross_matrix(t) * r
}

/// Fundamental matrix `F = K_s^{-T} E K_p^{-1}`, scaled to unit Frobenius norm.
pub fn fundamental_matrix(k_primary: &Mat3, k_secondary: &Mat3, e: &Mat3) -> Result<Mat3> {
    let (Some(kp_inv), Some(ks_inv)) = (k_primary.try_inverse(), k_secondary.try_inverse()) else {
        bail!("calibration matrix is singular");
    };
    let f = ks_inv.transpose() * e * kp_inv;
    let norm = f.norm();
    if norm <= Real::EPSILON {
        bail!("fundamental matrix vanishes; baseline is zero");
    }
    Ok(f / norm)
}
