//! Observation types for calibration and triangulation data.

use crate::{Pt2, Pt3};
use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Which camera of the stereo pair a measurement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraSide {
    Primary,
    Secondary,
}

impl CameraSide {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

/// A single view containing target-to-image point correspondences.
///
/// `points_3d` are in target coordinates (planar targets use `z = 0`),
/// `points_2d` are the corresponding raw pixel observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceView {
    pub points_3d: Vec<Pt3>,
    pub points_2d: Vec<Pt2>,
}

impl CorrespondenceView {
    /// # Errors
    ///
    /// Returns an error if the 3D and 2D point counts don't match.
    pub fn new(points_3d: Vec<Pt3>, points_2d: Vec<Pt2>) -> Result<Self> {
        ensure!(
            points_3d.len() == points_2d.len(),
            "3D / 2D point counts must match: {} vs {}",
            points_3d.len(),
            points_2d.len()
        );
        Ok(Self {
            points_3d,
            points_2d,
        })
    }

    /// Target points projected onto the `z = 0` plane.
    pub fn planar_points(&self) -> Vec<Pt2> {
        self.points_3d.iter().map(|p| Pt2::new(p.x, p.y)).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points_3d.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points_3d.is_empty()
    }
}

/// A co-captured pair of views of the same target, primary camera first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StereoView {
    pub primary: CorrespondenceView,
    pub secondary: CorrespondenceView,
}

/// A matched image point in the primary and secondary camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointPair {
    pub primary: Pt2,
    pub secondary: Pt2,
}

impl PointPair {
    pub fn new(primary: Pt2, secondary: Pt2) -> Self {
        Self { primary, secondary }
    }
}
