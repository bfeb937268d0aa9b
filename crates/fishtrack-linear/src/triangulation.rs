//! Linear triangulation of 3D points from multiple views.

use crate::math::smallest_right_singular_vector;
use anyhow::{bail, Result};
use fishtrack_core::{Mat34, Pt2, Pt3, Real};
use nalgebra::DMatrix;

/// DLT triangulation from projection matrices `P_i` and matching pixels.
///
/// The returned point is expressed in the frame the projection matrices map from.
pub fn triangulate_point_linear(cameras: &[Mat34], points: &[Pt2]) -> Result<Pt3> {
    if cameras.len() < 2 {
        bail!("need at least 2 views, got {}", cameras.len());
    }
    if cameras.len() != points.len() {
        bail!(
            "mismatched number of cameras ({}) and points ({})",
            cameras.len(),
            points.len()
        );
    }

    let mut a = DMatrix::<Real>::zeros(2 * cameras.len(), 4);
    for (i, (p, cam)) in points.iter().zip(cameras).enumerate() {
        a.row_mut(2 * i)
            .copy_from(&(p.x * cam.row(2) - cam.row(0)));
        a.row_mut(2 * i + 1)
            .copy_from(&(p.y * cam.row(2) - cam.row(1)));
    }

    let Some(x_h) = smallest_right_singular_vector(&a) else {
        bail!("svd failed during triangulation");
    };

    let w = x_h[3];
    if w.abs() <= Real::EPSILON {
        bail!("triangulated point lies at infinity");
    }

    Ok(Pt3::new(x_h[0] / w, x_h[1] / w, x_h[2] / w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector4;

    fn project(cam: &Mat34, p: &Pt3) -> Pt2 {
        let x = cam * Vector4::new(p.x, p.y, p.z, 1.0);
        Pt2::new(x.x / x.z, x.y / x.z)
    }

    #[test]
    fn two_views_recover_point() {
        let cam1 = Mat34::new(1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0);
        let cam2 = Mat34::new(1.0, 0.0, 0.0, -0.2, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0);

        let pw = Pt3::new(0.1, -0.05, 2.0);
        let est =
            triangulate_point_linear(&[cam1, cam2], &[project(&cam1, &pw), project(&cam2, &pw)])
                .unwrap();
        assert!((est - pw).norm() < 1e-9, "error too large: {}", (est - pw).norm());
    }

    #[test]
    fn single_view_is_rejected() {
        assert!(triangulate_point_linear(&[Mat34::zeros()], &[Pt2::origin()]).is_err());
    }
}
