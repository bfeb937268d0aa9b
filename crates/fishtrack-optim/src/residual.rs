//! Reprojection residuals generic over the scalar type, and their Jacobians.
//!
//! The same residual code runs on `f64` for evaluation and on `num-dual`
//! dual vectors for the Jacobian. Each view only touches a camera block and
//! one or two pose blocks, so the Jacobian is assembled view by view from a
//! small local parameter vector and scattered into the global matrix.

use crate::params::{CAMERA_DIM, POSE_DIM};
use fishtrack_core::{CorrespondenceView, Real};
use nalgebra::{DMatrix, DVector, RealField, SVector, Vector2, Vector3};
use num_dual::{jacobian, DualSVec64};

/// Residual assigned to each coordinate of a point that falls behind the camera.
pub(crate) const BEHIND_CAMERA_RESIDUAL: Real = 1e4;

/// Local dimension of a view seen directly by one camera: camera + board pose.
pub(crate) const DIRECT_DIM: usize = CAMERA_DIM + POSE_DIM;
/// Local dimension of a view seen through the rig: camera + board pose + relative pose.
pub(crate) const CHAINED_DIM: usize = CAMERA_DIM + 2 * POSE_DIM;

fn constant<T: RealField>(v: Real) -> T {
    nalgebra::convert(v)
}

/// Rotate `v` by the axis-angle vector `w`.
fn rotate<T: RealField>(w: &Vector3<T>, v: &Vector3<T>) -> Vector3<T> {
    let theta2 = w.norm_squared();
    if theta2 < constant(1e-20) {
        return v + w.cross(v);
    }
    let theta = theta2.sqrt();
    let axis = w / theta.clone();
    let (s, c) = theta.sin_cos();
    let along = axis.dot(v) * (T::one() - c.clone());
    v * c + axis.cross(v) * s + axis * along
}

/// Apply a `[wx, wy, wz, tx, ty, tz]` pose block to a point.
fn transform<T: RealField>(pose: &[T], p: &Vector3<T>) -> Vector3<T> {
    let w = Vector3::new(pose[0].clone(), pose[1].clone(), pose[2].clone());
    let t = Vector3::new(pose[3].clone(), pose[4].clone(), pose[5].clone());
    rotate(&w, p) + t
}

/// `observed - project(pc)` for a camera block `[fx, fy, cx, cy, k1, k2, p1, p2, k3]`.
fn pixel_residual<T: RealField>(camera: &[T], pc: &Vector3<T>, observed: [Real; 2]) -> Vector2<T> {
    if pc.z <= T::zero() {
        return Vector2::repeat(constant(BEHIND_CAMERA_RESIDUAL));
    }
    let x = pc.x.clone() / pc.z.clone();
    let y = pc.y.clone() / pc.z.clone();
    let (k1, k2, p1, p2, k3) = (
        camera[4].clone(),
        camera[5].clone(),
        camera[6].clone(),
        camera[7].clone(),
        camera[8].clone(),
    );

    let r2 = x.clone() * x.clone() + y.clone() * y.clone();
    let r4 = r2.clone() * r2.clone();
    let r6 = r4.clone() * r2.clone();
    let radial = T::one() + k1 * r2.clone() + k2 * r4 + k3 * r6;
    let two: T = constant(2.0);
    let xy = x.clone() * y.clone();
    let x_t = two.clone() * p1.clone() * xy.clone()
        + p2.clone() * (r2.clone() + two.clone() * x.clone() * x.clone());
    let y_t = p1 * (r2 + two.clone() * y.clone() * y.clone()) + two * p2 * xy;
    let x_d = x * radial.clone() + x_t;
    let y_d = y * radial + y_t;

    let u = camera[0].clone() * x_d + camera[2].clone();
    let v = camera[1].clone() * y_d + camera[3].clone();
    Vector2::new(constant::<T>(observed[0]) - u, constant::<T>(observed[1]) - v)
}

/// Stacked `(du, dv)` residuals of `view`.
///
/// Board points are carried through `poses` in order, so `[board_pose]`
/// observes the board directly and `[board_pose, relative_pose]` observes it
/// through a rig transform.
pub(crate) fn view_residuals<T: RealField>(
    camera: &[T],
    poses: &[&[T]],
    view: &CorrespondenceView,
) -> DVector<T> {
    let mut r = DVector::from_element(2 * view.len(), T::zero());
    for (i, (pw, obs)) in view.points_3d.iter().zip(&view.points_2d).enumerate() {
        let mut p = Vector3::new(constant(pw.x), constant(pw.y), constant(pw.z));
        for pose in poses {
            p = transform(pose, &p);
        }
        let res = pixel_residual(camera, &p, [obs.x, obs.y]);
        r[2 * i] = res.x.clone();
        r[2 * i + 1] = res.y.clone();
    }
    r
}

/// Differentiate `f` over the concatenated parameter `blocks` of `x` and
/// write the local Jacobian into `j` starting at `row`.
///
/// `blocks` lists `(offset, len)` ranges of `x`; their lengths must sum to `N`.
/// Returns the number of residual rows produced.
pub(crate) fn scatter_jacobian<const N: usize, F>(
    j: &mut DMatrix<Real>,
    row: usize,
    x: &DVector<Real>,
    blocks: &[(usize, usize)],
    f: F,
) -> usize
where
    F: Fn(&[DualSVec64<N>]) -> DVector<DualSVec64<N>>,
{
    let mut local = SVector::<Real, N>::zeros();
    let mut k = 0;
    for &(offset, len) in blocks {
        for i in 0..len {
            local[k] = x[offset + i];
            k += 1;
        }
    }
    debug_assert_eq!(k, N);

    let (r, j_local) = jacobian(|p: SVector<DualSVec64<N>, N>| f(p.as_slice()), local);
    for rr in 0..r.len() {
        let mut col = 0;
        for &(offset, len) in blocks {
            for i in 0..len {
                j[(row + rr, offset + i)] = j_local[(rr, col)];
                col += 1;
            }
        }
    }
    r.len()
}
