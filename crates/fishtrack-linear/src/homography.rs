use crate::math::{mat3_from_row_major, normalize_points_2d, smallest_right_singular_vector};
use fishtrack_core::{Mat3, Pt2, Real};
use nalgebra::DMatrix;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum HomographyError {
    #[error("need at least 4 point correspondences, got {0}")]
    NotEnoughPoints(usize),
    #[error("point counts differ: {0} target vs {1} image")]
    CountMismatch(usize, usize),
    #[error("degenerate point configuration")]
    Degenerate,
    #[error("svd failed")]
    SvdFailed,
}

/// Estimate `H` such that `x' ~ H x` using the normalized DLT.
///
/// The result is scaled so that `H[2, 2] == 1` whenever that entry is not
/// vanishingly small.
pub fn dlt_homography(world: &[Pt2], image: &[Pt2]) -> Result<Mat3, HomographyError> {
    let n = world.len();
    if image.len() != n {
        return Err(HomographyError::CountMismatch(n, image.len()));
    }
    if n < 4 {
        return Err(HomographyError::NotEnoughPoints(n));
    }

    let (world_n, t_w) = normalize_points_2d(world).ok_or(HomographyError::Degenerate)?;
    let (image_n, t_i) = normalize_points_2d(image).ok_or(HomographyError::Degenerate)?;

    let mut a = DMatrix::<Real>::zeros(2 * n, 9);
    for (i, (pw, pi)) in world_n.iter().zip(image_n.iter()).enumerate() {
        let (x, y) = (pw.x, pw.y);
        let (u, v) = (pi.x, pi.y);

        let r0 = 2 * i;
        let r1 = 2 * i + 1;

        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;

        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    let h = smallest_right_singular_vector(&a).ok_or(HomographyError::SvdFailed)?;
    let h_norm = mat3_from_row_major(&h);

    // Undo the conditioning: H = T_i^{-1} * H_norm * T_w
    let t_i_inv = t_i.try_inverse().ok_or(HomographyError::Degenerate)?;
    let mut h_mat = t_i_inv * h_norm * t_w;

    let scale = h_mat[(2, 2)];
    if scale.abs() > Real::EPSILON {
        h_mat /= scale;
    }

    Ok(h_mat)
}
