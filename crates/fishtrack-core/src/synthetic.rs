//! Synthetic planar target helpers.
//!
//! The functions here build planar point grids (Z=0), generate simple board
//! poses, and project the target into a camera to produce
//! [`CorrespondenceView`] instances. Noise is deterministic so synthetic
//! datasets are stable across platforms.

use crate::{CorrespondenceView, Iso3, PinholeCamera, Pt3, Real, Vec2};
use anyhow::Result;
use nalgebra::{Translation3, UnitQuaternion, Vector3};

/// Generate a planar grid of 3D points (Z=0) with `nx * ny` points in
/// row-major order (Y major).
pub fn grid_points(nx: usize, ny: usize, spacing: Real) -> Vec<Pt3> {
    let mut points = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            points.push(Pt3::new(i as Real * spacing, j as Real * spacing, 0.0));
        }
    }
    points
}

/// Board poses (target -> camera) that tilt around both in-plane axes while
/// keeping the board centred in front of the camera.
///
/// `center` is the board centre in target coordinates.
pub fn board_poses(n_views: usize, center: Pt3, distance: Real) -> Vec<Iso3> {
    (0..n_views)
        .map(|v| {
            let phase = v as Real * 1.3;
            let tilt_x = 0.35 * phase.sin();
            let tilt_y = 0.35 * (phase * 0.7 + 0.5).cos();
            let roll = 0.1 * (phase * 1.9).sin();
            let rotation = UnitQuaternion::from_euler_angles(tilt_x, tilt_y, roll);
            let offset = rotation * center.coords;
            let translation = Vector3::new(
                -offset.x + 0.02 * phase.cos(),
                -offset.y - 0.015 * phase.sin(),
                distance - offset.z + 0.05 * (v % 3) as Real,
            );
            Iso3::from_parts(Translation3::from(translation), rotation)
        })
        .collect()
}

/// Project a planar target into the camera, requiring every point to be projectable.
///
/// `cam_from_target` maps target-frame points into the camera frame.
pub fn project_view(
    camera: &PinholeCamera,
    cam_from_target: &Iso3,
    target_points: &[Pt3],
    noise: &UniformPixelNoise,
    view_idx: usize,
) -> Result<CorrespondenceView> {
    let mut pixels = Vec::with_capacity(target_points.len());
    for (idx, pw) in target_points.iter().enumerate() {
        let pc = cam_from_target.transform_point(pw);
        let Some(uv) = camera.project(&pc) else {
            anyhow::bail!("point {idx} not projectable (z={:.6})", pc.z);
        };
        pixels.push(uv + noise.sample(view_idx, idx));
    }
    CorrespondenceView::new(target_points.to_vec(), pixels)
}

/// Deterministic uniform pixel noise in `[-max_abs_px, +max_abs_px]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UniformPixelNoise {
    pub seed: u64,
    pub max_abs_px: Real,
}

impl UniformPixelNoise {
    pub fn none() -> Self {
        Self::default()
    }

    /// Sample a deterministic 2D noise vector for a `(view_idx, point_idx)` key.
    pub fn sample(&self, view_idx: usize, point_idx: usize) -> Vec2 {
        let max_abs = self.max_abs_px.abs();
        if max_abs == 0.0 {
            return Vec2::zeros();
        }

        let key = mix_key(self.seed, view_idx, point_idx);
        let u = unit_f64(splitmix64(key));
        let v = unit_f64(splitmix64(key ^ 0x94D0_49BB_1331_11EB));
        Vec2::new((u - 0.5) * 2.0 * max_abs, (v - 0.5) * 2.0 * max_abs)
    }
}

fn mix_key(seed: u64, view_idx: usize, point_idx: usize) -> u64 {
    seed ^ (view_idx as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (point_idx as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9)
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn unit_f64(x: u64) -> f64 {
    (x >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BrownConrady, CameraIntrinsics};

    #[test]
    fn grid_is_row_major() {
        let pts = grid_points(3, 2, 0.5);
        assert_eq!(pts.len(), 6);
        assert_eq!(pts[1], Pt3::new(0.5, 0.0, 0.0));
        assert_eq!(pts[3], Pt3::new(0.0, 0.5, 0.0));
    }

    #[test]
    fn noise_is_deterministic_and_bounded() {
        let noise = UniformPixelNoise {
            seed: 7,
            max_abs_px: 0.5,
        };
        let a = noise.sample(3, 11);
        assert_eq!(a, noise.sample(3, 11));
        assert!(a.x.abs() <= 0.5 && a.y.abs() <= 0.5);
        assert_ne!(a, noise.sample(3, 12));
    }

    #[test]
    fn board_poses_keep_target_in_view() {
        let cam = PinholeCamera::new(
            CameraIntrinsics {
                fx: 900.0,
                fy: 900.0,
                cx: 640.0,
                cy: 480.0,
                skew: 0.0,
            },
            BrownConrady::default(),
        );
        let pts = grid_points(8, 6, 0.04);
        let center = Pt3::new(0.14, 0.1, 0.0);
        for (v, pose) in board_poses(10, center, 1.0).iter().enumerate() {
            let view = project_view(&cam, pose, &pts, &UniformPixelNoise::none(), v).unwrap();
            for px in &view.points_2d {
                assert!(px.x > 0.0 && px.x < 1280.0 && px.y > 0.0 && px.y < 960.0);
            }
        }
    }
}
