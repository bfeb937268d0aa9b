//! Stereo rectification (Bouguet) for a calibrated camera pair.
//!
//! Given `x_s = R x_p + T`, both cameras are rotated half-way towards each
//! other and then jointly so the baseline lies along the rectified x axis.
//! Afterwards corresponding points share the same rectified row.

use crate::math::rodrigues;
use crate::triangulation::triangulate_point_linear;
use anyhow::{bail, Result};
use fishtrack_core::{
    projection_matrix, CameraIntrinsics, Mat3, Mat34, Mat4, PinholeCamera, Pt2, Pt3, Real, Vec3,
};
use log::debug;
use nalgebra::Rotation3;
use serde::{Deserialize, Serialize};

/// Rectifying rotations, rectified projections and the disparity-to-depth matrix.
///
/// `r1`/`r2` rotate primary/secondary camera coordinates into the rectified
/// frames; `p1`/`p2` project rectified coordinates to rectified pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StereoRectification {
    pub r1: Mat3,
    pub r2: Mat3,
    pub p1: Mat34,
    pub p2: Mat34,
    pub q: Mat4,
}

/// Compute the rectification for a stereo pair with relative pose `(r, t)`.
pub fn stereo_rectify(
    primary: &CameraIntrinsics,
    secondary: &CameraIntrinsics,
    r: &Mat3,
    t: &Vec3,
) -> Result<StereoRectification> {
    let baseline = t.norm();
    if baseline <= Real::EPSILON {
        bail!("cannot rectify a stereo pair with zero baseline");
    }

    let om = Rotation3::from_matrix(r).scaled_axis();
    let r_half = rodrigues(&(-0.5 * om));
    let t_half = r_half * t;

    let idx = if t_half.x.abs() > t_half.y.abs() { 0 } else { 1 };
    let mut uu = Vec3::zeros();
    uu[idx] = if t_half[idx] > 0.0 { 1.0 } else { -1.0 };

    let mut ww = t_half.cross(&uu);
    let nw = ww.norm();
    if nw > 0.0 {
        ww *= (t_half[idx].abs() / baseline).clamp(-1.0, 1.0).acos() / nw;
    }
    let w_r = rodrigues(&ww);

    let r1 = w_r * r_half.transpose();
    let r2 = w_r * r_half;
    let t_new = r2 * t;

    let f = primary.fy.min(secondary.fy);
    let cx = 0.5 * (primary.cx + secondary.cx);
    let cy = 0.5 * (primary.cy + secondary.cy);

    let k_rect = Mat3::new(f, 0.0, cx, 0.0, f, cy, 0.0, 0.0, 1.0);
    let mut baseline = Vec3::zeros();
    baseline[idx] = t_new[idx];
    let p1 = projection_matrix(&k_rect, &Mat3::identity(), &Vec3::zeros());
    let p2 = projection_matrix(&k_rect, &Mat3::identity(), &baseline);

    let mut q = Mat4::zeros();
    q[(0, 0)] = 1.0;
    q[(1, 1)] = 1.0;
    q[(0, 3)] = -cx;
    q[(1, 3)] = -cy;
    q[(2, 3)] = f;
    q[(3, 2)] = -1.0 / t_new[idx];

    debug!(
        "rectified along {} axis: f {f:.2}, baseline {:.4}",
        if idx == 0 { "x" } else { "y" },
        t_new[idx]
    );
    Ok(StereoRectification { r1, r2, p1, p2, q })
}

/// Map a raw (distorted) pixel into rectified pixel coordinates.
pub fn rectify_pixel(
    camera: &PinholeCamera,
    r_rect: &Mat3,
    p_rect: &Mat34,
    px: &Pt2,
) -> Option<Pt2> {
    let n = camera.undistort_to_normalized(px)?;
    let ray = r_rect * Vec3::new(n.x, n.y, 1.0);
    if ray.z <= Real::EPSILON {
        return None;
    }
    Some(Pt2::new(
        p_rect[(0, 0)] * ray.x / ray.z + p_rect[(0, 2)],
        p_rect[(1, 1)] * ray.y / ray.z + p_rect[(1, 2)],
    ))
}

/// Map a rectified pixel back to the raw (distorted) pixel it samples from.
pub fn unrectify_pixel(
    camera: &PinholeCamera,
    r_rect: &Mat3,
    p_rect: &Mat34,
    rect_px: &Pt2,
) -> Option<Pt2> {
    let (f, cx, cy) = (p_rect[(0, 0)], p_rect[(0, 2)], p_rect[(1, 2)]);
    let ray = Vec3::new((rect_px.x - cx) / f, (rect_px.y - cy) / f, 1.0);
    let cam_ray = r_rect.transpose() * ray;
    camera.project(&Pt3::from(cam_ray))
}

impl StereoRectification {
    /// Triangulate rectified pixels and express the point in the primary camera frame.
    pub fn triangulate(&self, primary_rect: &Pt2, secondary_rect: &Pt2) -> Result<Pt3> {
        let x_rect = triangulate_point_linear(&[self.p1, self.p2], &[*primary_rect, *secondary_rect])?;
        Ok(Pt3::from(self.r1.transpose() * x_rect.coords))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fishtrack_core::BrownConrady;

    fn cameras() -> (PinholeCamera, PinholeCamera) {
        let primary = PinholeCamera::new(
            CameraIntrinsics {
                fx: 1450.0,
                fy: 1448.0,
                cx: 955.0,
                cy: 722.0,
                skew: 0.0,
            },
            BrownConrady {
                k1: -0.12,
                k2: 0.03,
                ..BrownConrady::default()
            },
        );
        let secondary = PinholeCamera::new(
            CameraIntrinsics {
                fx: 1440.0,
                fy: 1437.0,
                cx: 968.0,
                cy: 716.0,
                skew: 0.0,
            },
            BrownConrady {
                k1: -0.1,
                p1: 0.001,
                ..BrownConrady::default()
            },
        );
        (primary, secondary)
    }

    fn relative() -> (Mat3, Vec3) {
        (
            rodrigues(&Vec3::new(0.01, -0.08, 0.005)),
            Vec3::new(-0.15, 0.004, 0.01),
        )
    }

    #[test]
    fn rectified_rows_align_and_depth_is_recovered() {
        let (primary, secondary) = cameras();
        let (r, t) = relative();
        let rect = stereo_rectify(&primary.intrinsics, &secondary.intrinsics, &r, &t).unwrap();

        for x in [
            Pt3::new(0.1, -0.05, 1.5),
            Pt3::new(-0.3, 0.2, 2.4),
            Pt3::new(0.02, 0.1, 0.9),
        ] {
            let xs = Pt3::from(r * x.coords + t);
            let up = primary.project(&x).unwrap();
            let us = secondary.project(&xs).unwrap();

            let rp = rectify_pixel(&primary, &rect.r1, &rect.p1, &up).unwrap();
            let rs = rectify_pixel(&secondary, &rect.r2, &rect.p2, &us).unwrap();
            assert!((rp.y - rs.y).abs() < 1e-6, "row mismatch {} vs {}", rp.y, rs.y);

            let est = rect.triangulate(&rp, &rs).unwrap();
            assert!((est - x).norm() < 1e-6, "est={est:?} gt={x:?}");
        }
    }

    #[test]
    fn unrectify_inverts_rectify() {
        let (primary, secondary) = cameras();
        let (r, t) = relative();
        let rect = stereo_rectify(&primary.intrinsics, &secondary.intrinsics, &r, &t).unwrap();
        let px = Pt2::new(400.0, 900.0);
        let rp = rectify_pixel(&primary, &rect.r1, &rect.p1, &px).unwrap();
        let back = unrectify_pixel(&primary, &rect.r1, &rect.p1, &rp).unwrap();
        assert!((back - px).norm() < 1e-6);
    }

    #[test]
    fn zero_baseline_is_rejected() {
        let (primary, secondary) = cameras();
        assert!(stereo_rectify(
            &primary.intrinsics,
            &secondary.intrinsics,
            &Mat3::identity(),
            &Vec3::zeros()
        )
        .is_err());
    }
}
