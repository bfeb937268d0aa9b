//! Stereo triangulation of matched pixels into the primary camera frame.

use crate::config::TriangulationConfig;
use crate::error::{CalibrationError, Result};
use crate::result::CalibrationResult;
use fishtrack_core::{Mat3, PinholeCamera, PointPair, Pt2, Pt3, Real, Vec3};
use fishtrack_linear::{rectify_pixel, StereoRectification};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A 3D point reconstructed from one matched pixel pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangulatedPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<u64>,
    /// Position in the primary camera frame, in calibration world units.
    pub position: Pt3,
    /// Mean pixel distance between the observations and the reprojected point.
    pub reprojection_error: Real,
    /// What the correspondence was matched on (marker payload or list index).
    pub label: String,
}

/// Pixel correspondences listed per camera; entries pair up by index.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointCorrespondences {
    pub primary: Vec<Pt2>,
    pub secondary: Vec<Pt2>,
}

impl PointCorrespondences {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| CalibrationError::io(path, e))?;
        serde_json::from_str(&text).map_err(|source| CalibrationError::MalformedCorrespondenceFile {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn pairs(&self) -> Result<Vec<PointPair>> {
        if self.primary.len() != self.secondary.len() {
            return Err(CalibrationError::CorrespondenceCountMismatch {
                primary: self.primary.len(),
                secondary: self.secondary.len(),
            });
        }
        Ok(self
            .primary
            .iter()
            .zip(&self.secondary)
            .map(|(p, s)| PointPair::new(*p, *s))
            .collect())
    }
}

/// Triangulates raw pixel pairs with a stereo calibration.
#[derive(Debug, Clone)]
pub struct StereoTriangulator {
    primary: PinholeCamera,
    secondary: PinholeCamera,
    rectification: StereoRectification,
    rotation: Mat3,
    translation: Vec3,
    config: TriangulationConfig,
}

impl StereoTriangulator {
    pub fn new(result: &CalibrationResult, config: TriangulationConfig) -> Result<Self> {
        let (primary, secondary, stereo) = result.stereo_parts()?;
        Ok(Self {
            primary: primary.camera(),
            secondary: secondary.camera(),
            rectification: stereo.rectification,
            rotation: stereo.rotation,
            translation: stereo.translation,
            config,
        })
    }

    pub fn config(&self) -> &TriangulationConfig {
        &self.config
    }

    /// Triangulate without applying the reprojection bound.
    ///
    /// Returns the point in the primary frame and its mean reprojection error.
    pub fn triangulate_unchecked(&self, pair: &PointPair) -> Result<(Pt3, Real)> {
        let rect = &self.rectification;
        let failed = |what: &str| CalibrationError::Triangulation(format!("{what} for {pair:?}"));

        let rp = rectify_pixel(&self.primary, &rect.r1, &rect.p1, &pair.primary)
            .ok_or_else(|| failed("primary pixel cannot be rectified"))?;
        let rs = rectify_pixel(&self.secondary, &rect.r2, &rect.p2, &pair.secondary)
            .ok_or_else(|| failed("secondary pixel cannot be rectified"))?;

        let x = rect
            .triangulate(&rp, &rs)
            .map_err(|e| CalibrationError::Triangulation(format!("{e:#}")))?;

        let xs = Pt3::from(self.rotation * x.coords + self.translation);
        let up = self
            .primary
            .project(&x)
            .ok_or_else(|| failed("point behind primary camera"))?;
        let us = self
            .secondary
            .project(&xs)
            .ok_or_else(|| failed("point behind secondary camera"))?;
        let err = 0.5 * ((up - pair.primary).norm() + (us - pair.secondary).norm());
        Ok((x, err))
    }

    /// Triangulate one pair; points over the reprojection bound are dropped with a warning.
    pub fn triangulate(
        &self,
        pair: &PointPair,
        frame: Option<u64>,
        label: &str,
    ) -> Option<TriangulatedPoint> {
        match self.triangulate_unchecked(pair) {
            Ok((position, err)) if err <= self.config.max_reprojection_error => {
                Some(TriangulatedPoint {
                    frame,
                    position,
                    reprojection_error: err,
                    label: label.to_string(),
                })
            }
            Ok((position, err)) => {
                log::warn!(
                    "dropping point {label} (frame {frame:?}) at {:?}: reprojection error {err:.3} px over bound {:.3} px",
                    position.coords.as_slice(),
                    self.config.max_reprojection_error
                );
                None
            }
            Err(e) => {
                log::warn!("dropping point {label} (frame {frame:?}): {e}");
                None
            }
        }
    }

    pub fn triangulate_all(&self, pairs: &[PointPair]) -> Vec<TriangulatedPoint> {
        pairs
            .iter()
            .enumerate()
            .filter_map(|(idx, pair)| self.triangulate(pair, None, &idx.to_string()))
            .collect()
    }
}

/// Triangulate every pair of a correspondence file with a saved stereo calibration.
pub fn triangulate_points(
    point_config_path: &Path,
    calibration_path: &Path,
    config: TriangulationConfig,
) -> Result<Vec<TriangulatedPoint>> {
    let calibration = CalibrationResult::load(calibration_path)?;
    let triangulator = StereoTriangulator::new(&calibration, config)?;
    let pairs = PointCorrespondences::load(point_config_path)?.pairs()?;
    let points = triangulator.triangulate_all(&pairs);
    log::info!(
        "triangulated {} of {} correspondences from {}",
        points.len(),
        pairs.len(),
        point_config_path.display()
    );
    Ok(points)
}
