//! Packing of cameras and poses into flat parameter vectors.
//!
//! Camera block (9): `fx, fy, cx, cy, k1, k2, p1, p2, k3`. Skew is held at zero.
//! Pose block (6): axis-angle rotation followed by translation.

use fishtrack_core::{BrownConrady, CameraIntrinsics, Iso3, PinholeCamera, Real, Vec3};
use nalgebra::{DVector, Translation3, UnitQuaternion};

pub const CAMERA_DIM: usize = 9;
pub const POSE_DIM: usize = 6;

pub fn write_camera(x: &mut DVector<Real>, offset: usize, camera: &PinholeCamera) {
    let k = &camera.intrinsics;
    let d = camera.distortion.to_array();
    let block = [k.fx, k.fy, k.cx, k.cy, d[0], d[1], d[2], d[3], d[4]];
    x.rows_mut(offset, CAMERA_DIM).copy_from_slice(&block);
}

pub fn read_camera(x: &DVector<Real>, offset: usize) -> PinholeCamera {
    let b = x.rows(offset, CAMERA_DIM);
    PinholeCamera::new(
        CameraIntrinsics {
            fx: b[0],
            fy: b[1],
            cx: b[2],
            cy: b[3],
            skew: 0.0,
        },
        BrownConrady::from_array([b[4], b[5], b[6], b[7], b[8]]),
    )
}

pub fn write_pose(x: &mut DVector<Real>, offset: usize, pose: &Iso3) {
    let w = pose.rotation.scaled_axis();
    let t = pose.translation.vector;
    x.rows_mut(offset, POSE_DIM)
        .copy_from_slice(&[w.x, w.y, w.z, t.x, t.y, t.z]);
}

pub fn read_pose(x: &DVector<Real>, offset: usize) -> Iso3 {
    let b = x.rows(offset, POSE_DIM);
    Iso3::from_parts(
        Translation3::new(b[3], b[4], b[5]),
        UnitQuaternion::from_scaled_axis(Vec3::new(b[0], b[1], b[2])),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_and_pose_blocks_roundtrip() {
        let camera = PinholeCamera::new(
            CameraIntrinsics {
                fx: 1400.0,
                fy: 1390.0,
                cx: 950.0,
                cy: 710.0,
                skew: 0.0,
            },
            BrownConrady::from_array([-0.1, 0.02, 0.001, -0.002, 0.0]),
        );
        let pose = Iso3::from_parts(
            Translation3::new(0.1, -0.2, 1.5),
            UnitQuaternion::from_scaled_axis(Vec3::new(0.3, -0.1, 0.05)),
        );

        let mut x = DVector::zeros(CAMERA_DIM + POSE_DIM);
        write_camera(&mut x, 0, &camera);
        write_pose(&mut x, CAMERA_DIM, &pose);

        assert_eq!(read_camera(&x, 0), camera);
        let back = read_pose(&x, CAMERA_DIM);
        assert!((back.translation.vector - pose.translation.vector).norm() < 1e-12);
        assert!(back.rotation.angle_to(&pose.rotation) < 1e-12);
    }
}
