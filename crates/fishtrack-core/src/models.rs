use serde::{Deserialize, Serialize};

use crate::{Mat3, Pt2, Pt3, Real, Vec2, Vec3};

/// Pinhole camera intrinsics.
///
/// The corresponding calibration matrix `K` has the form:
///
/// ```text
/// [ fx  skew  cx ]
/// [  0   fy   cy ]
/// [  0    0    1 ]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: Real,
    pub fy: Real,
    pub cx: Real,
    pub cy: Real,
    pub skew: Real,
}

impl CameraIntrinsics {
    /// Build the 3×3 calibration matrix `K`.
    pub fn k_matrix(&self) -> Mat3 {
        Mat3::new(
            self.fx, self.skew, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0,
        )
    }

    /// Attempt to construct intrinsics from a 3×3 calibration matrix `K`.
    ///
    /// The matrix is first normalised so that `K[2, 2] == 1`. If the structure
    /// does not match the upper-triangular form within a small tolerance,
    /// `None` is returned.
    pub fn try_from_k_matrix(k: &Mat3) -> Option<Self> {
        let mut k_norm = *k;
        let eps = 1e-9;

        let k33 = k_norm[(2, 2)];
        if k33.abs() < eps {
            return None;
        }
        k_norm /= k33;

        if k_norm[(1, 0)].abs() > eps || k_norm[(2, 0)].abs() > eps || k_norm[(2, 1)].abs() > eps
        {
            return None;
        }

        Some(Self {
            fx: k_norm[(0, 0)],
            skew: k_norm[(0, 1)],
            cx: k_norm[(0, 2)],
            fy: k_norm[(1, 1)],
            cy: k_norm[(1, 2)],
        })
    }

    /// Map normalised image-plane coordinates to pixels.
    pub fn normalized_to_pixel(&self, n: &Vec2) -> Pt2 {
        Pt2::new(self.fx * n.x + self.skew * n.y + self.cx, self.fy * n.y + self.cy)
    }

    /// Map pixels to normalised image-plane coordinates.
    ///
    /// Returns `None` if a focal length is zero.
    pub fn pixel_to_normalized(&self, px: &Pt2) -> Option<Vec2> {
        if self.fx == 0.0 || self.fy == 0.0 {
            return None;
        }
        let y = (px.y - self.cy) / self.fy;
        let x = (px.x - self.cx - self.skew * y) / self.fx;
        Some(Vec2::new(x, y))
    }
}

/// Brown–Conrady radial–tangential distortion (OpenCV order `k1, k2, p1, p2, k3`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BrownConrady {
    pub k1: Real,
    pub k2: Real,
    pub p1: Real,
    pub p2: Real,
    pub k3: Real,
}

impl BrownConrady {
    const UNDISTORT_ITERS: usize = 20;
    const UNDISTORT_TOL: Real = 1e-14;

    /// Build from the OpenCV coefficient order `[k1, k2, p1, p2, k3]`.
    pub fn from_array(d: [Real; 5]) -> Self {
        Self {
            k1: d[0],
            k2: d[1],
            p1: d[2],
            p2: d[3],
            k3: d[4],
        }
    }

    /// Coefficients in the OpenCV order `[k1, k2, p1, p2, k3]`.
    pub fn to_array(&self) -> [Real; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn is_zero(&self) -> bool {
        self.to_array().iter().all(|c| *c == 0.0)
    }

    /// Apply distortion to undistorted normalised coordinates.
    pub fn distort(&self, n: &Vec2) -> Vec2 {
        let (x, y) = (n.x, n.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r2 * r2 + self.k3 * r2 * r2 * r2;
        let x_t = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let y_t = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        Vec2::new(x * radial + x_t, y * radial + y_t)
    }

    /// Remove distortion from distorted normalised coordinates.
    ///
    /// Fixed-point iteration starting from the distorted coordinates.
    pub fn undistort(&self, n_d: &Vec2) -> Vec2 {
        if self.is_zero() {
            return *n_d;
        }

        let (x_d, y_d) = (n_d.x, n_d.y);
        let mut x_u = x_d;
        let mut y_u = y_d;

        for _ in 0..Self::UNDISTORT_ITERS {
            let r2 = x_u * x_u + y_u * y_u;
            let radial = 1.0 + self.k1 * r2 + self.k2 * r2 * r2 + self.k3 * r2 * r2 * r2;
            let x_t = 2.0 * self.p1 * x_u * y_u + self.p2 * (r2 + 2.0 * x_u * x_u);
            let y_t = self.p1 * (r2 + 2.0 * y_u * y_u) + 2.0 * self.p2 * x_u * y_u;

            let x_new = (x_d - x_t) / radial;
            let y_new = (y_d - y_t) / radial;

            let step = (x_new - x_u).abs().max((y_new - y_u).abs());
            x_u = x_new;
            y_u = y_new;
            if step < Self::UNDISTORT_TOL {
                break;
            }
        }

        Vec2::new(x_u, y_u)
    }
}

/// Pinhole camera model with Brown–Conrady distortion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PinholeCamera {
    pub intrinsics: CameraIntrinsics,
    #[serde(default)]
    pub distortion: BrownConrady,
}

impl PinholeCamera {
    pub fn new(intrinsics: CameraIntrinsics, distortion: BrownConrady) -> Self {
        Self {
            intrinsics,
            distortion,
        }
    }

    /// Project a point in camera coordinates to distorted pixel coordinates.
    ///
    /// Returns `None` for points on or behind the image plane.
    pub fn project(&self, p_c: &Pt3) -> Option<Pt2> {
        if p_c.z <= 0.0 {
            return None;
        }
        let n = Vec2::new(p_c.x / p_c.z, p_c.y / p_c.z);
        let n_d = self.distortion.distort(&n);
        Some(self.intrinsics.normalized_to_pixel(&n_d))
    }

    /// Map a measured (distorted) pixel to undistorted normalised coordinates.
    pub fn undistort_to_normalized(&self, px: &Pt2) -> Option<Vec2> {
        let n_d = self.intrinsics.pixel_to_normalized(px)?;
        Some(self.distortion.undistort(&n_d))
    }

    /// Unit-norm ray direction in camera coordinates for a pixel.
    pub fn unproject_ray(&self, px: &Pt2) -> Option<Vec3> {
        let n = self.undistort_to_normalized(px)?;
        Some(Vec3::new(n.x, n.y, 1.0).normalize())
    }
}
