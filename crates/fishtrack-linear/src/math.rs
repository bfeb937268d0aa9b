//! Shared numerical helpers for the linear solvers.
//!
//! - Hartley normalization for 2D points (conditioning before DLT),
//! - null-space extraction from a homogeneous system `A x = 0`,
//! - Rodrigues conversions between axis-angle vectors and rotation matrices.

use fishtrack_core::{Mat3, Pt2, Real, Vec3};
use nalgebra::{DMatrix, DVector, Rotation3};

/// Hartley normalization for 2D points.
///
/// Centers points at the origin and scales so that the mean distance from
/// the origin is `√2`. Returns the normalized points and the 3×3 transform
/// `T` such that `p_norm = T * p_homogeneous`, or `None` if the input is
/// empty or degenerate.
pub fn normalize_points_2d(points: &[Pt2]) -> Option<(Vec<Pt2>, Mat3)> {
    if points.is_empty() {
        return None;
    }

    let n = points.len() as Real;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(ax, ay), p| (ax + p.x, ay + p.y));
    let (cx, cy) = (sx / n, sy / n);

    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<Real>()
        / n;

    if mean_dist <= Real::EPSILON {
        return None;
    }

    let scale = (2.0 as Real).sqrt() / mean_dist;
    let t = Mat3::new(
        scale,
        0.0,
        -scale * cx,
        0.0,
        scale,
        -scale * cy,
        0.0,
        0.0,
        1.0,
    );

    let norm = points
        .iter()
        .map(|p| Pt2::new((p.x - cx) * scale, (p.y - cy) * scale))
        .collect();

    Some((norm, t))
}

/// Right singular vector of `a` for the smallest singular value.
///
/// Systems with fewer rows than columns are padded with zero rows so the
/// thin SVD still exposes the full right null space.
pub fn smallest_right_singular_vector(a: &DMatrix<Real>) -> Option<DVector<Real>> {
    let (rows, cols) = a.shape();
    let a = if rows < cols {
        let mut padded = DMatrix::<Real>::zeros(cols, cols);
        padded.view_mut((0, 0), (rows, cols)).copy_from(a);
        padded
    } else {
        a.clone()
    };

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    Some(v_t.row(v_t.nrows() - 1).transpose())
}

/// Reshape a row-major 9-vector into a 3×3 matrix.
pub fn mat3_from_row_major(h: &DVector<Real>) -> Mat3 {
    let mut m = Mat3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            m[(r, c)] = h[3 * r + c];
        }
    }
    m
}

/// Rotation matrix for an axis-angle vector (Rodrigues).
pub fn rodrigues(axis_angle: &Vec3) -> Mat3 {
    Rotation3::new(*axis_angle).into_inner()
}

/// Axis-angle vector for a rotation matrix (inverse Rodrigues).
pub fn rodrigues_inverse(r: &Mat3) -> Vec3 {
    Rotation3::from_matrix(r).scaled_axis()
}

/// Closest rotation to `m` in the Frobenius sense (polar decomposition via SVD).
pub fn nearest_rotation(m: &Mat3) -> Option<Mat3> {
    let svd = m.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r = u_flipped * v_t;
    }
    Some(r)
}
