use crate::config::CalibrationMode;
use crate::error::{CalibrationError, Result};
use crate::io::write_json_atomic;
use fishtrack_core::{BrownConrady, CameraIntrinsics, CameraSide, Iso3, Mat3, PinholeCamera, Real, Vec3};
use fishtrack_linear::StereoRectification;
use nalgebra::{Rotation3, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Calibrated parameters of one camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    pub intrinsics: CameraIntrinsics,
    pub distortion: BrownConrady,
    /// RMS reprojection error over the calibration images, in pixels.
    pub rms_error: Real,
}

impl CameraCalibration {
    pub fn camera(&self) -> PinholeCamera {
        PinholeCamera::new(self.intrinsics, self.distortion)
    }
}

/// Relative pose and derived two-view geometry of a calibrated pair.
///
/// `x_secondary = rotation * x_primary + translation`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StereoGeometry {
    pub rotation: Mat3,
    pub translation: Vec3,
    pub essential: Mat3,
    pub fundamental: Mat3,
    pub rms_error: Real,
    pub rectification: StereoRectification,
}

impl StereoGeometry {
    pub fn secondary_from_primary(&self) -> Iso3 {
        Iso3::from_parts(
            Translation3::from(self.translation),
            UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(self.rotation)),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub mode: CalibrationMode,
    pub image_width: u32,
    pub image_height: u32,
    pub primary: CameraCalibration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<CameraCalibration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stereo: Option<StereoGeometry>,
}

impl CalibrationResult {
    pub fn camera(&self, side: CameraSide) -> Option<&CameraCalibration> {
        match side {
            CameraSide::Primary => Some(&self.primary),
            CameraSide::Secondary => self.secondary.as_ref(),
        }
    }

    /// Camera pair and stereo geometry; fails for a mono calibration.
    pub fn stereo_parts(&self) -> Result<(&CameraCalibration, &CameraCalibration, &StereoGeometry)> {
        match (&self.mode, &self.secondary, &self.stereo) {
            (CalibrationMode::Stereo, Some(secondary), Some(stereo)) => {
                Ok((&self.primary, secondary, stereo))
            }
            _ => Err(CalibrationError::InvalidConfiguration(
                "a stereo calibration is required".into(),
            )),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)?;
        log::info!("saved calibration to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| CalibrationError::io(path, e))?;
        let result: Self = serde_json::from_str(&text).map_err(|source| {
            CalibrationError::MalformedCalibrationFile {
                path: path.to_path_buf(),
                source,
            }
        })?;
        if result.mode == CalibrationMode::Stereo
            && (result.secondary.is_none() || result.stereo.is_none())
        {
            return Err(CalibrationError::MalformedCalibrationFile {
                path: path.to_path_buf(),
                source: serde::de::Error::custom(
                    "stereo mode without the secondary camera or stereo geometry",
                ),
            });
        }
        Ok(result)
    }
}
