use crate::error::{CalibrationError, Result};
use fishtrack_core::{Pt3, Real};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMode {
    Mono,
    #[default]
    Stereo,
}

/// Chessboard geometry: inner-corner counts and square size in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternSpec {
    pub columns: usize,
    pub rows: usize,
    pub square_size: Real,
}

impl Default for PatternSpec {
    fn default() -> Self {
        Self {
            columns: 9,
            rows: 6,
            square_size: 0.025,
        }
    }
}

impl PatternSpec {
    pub fn corner_count(&self) -> usize {
        self.columns * self.rows
    }

    /// Board-frame position of inner corner `(i, j)` (column, row).
    pub fn corner_position(&self, i: usize, j: usize) -> Pt3 {
        Pt3::new(
            i as Real * self.square_size,
            j as Real * self.square_size,
            0.0,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationInput {
    pub image_width: u32,
    pub image_height: u32,
    pub mode: CalibrationMode,
    pub pattern: PatternSpec,
    /// Minimum number of usable images (stereo: image pairs).
    pub min_samples: usize,
    /// Largest accepted RMS reprojection error in pixels.
    pub max_rms_error: Real,
}

impl Default for CalibrationInput {
    fn default() -> Self {
        Self {
            image_width: 1920,
            image_height: 1440,
            mode: CalibrationMode::Stereo,
            pattern: PatternSpec::default(),
            min_samples: 5,
            max_rms_error: 1.0,
        }
    }
}

impl CalibrationInput {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(CalibrationError::InvalidConfiguration(msg));
        if self.image_width == 0 || self.image_height == 0 {
            return invalid(format!(
                "image size must be positive, got {}x{}",
                self.image_width, self.image_height
            ));
        }
        if self.pattern.columns < 2 || self.pattern.rows < 2 {
            return invalid(format!(
                "pattern needs at least 2x2 inner corners, got {}x{}",
                self.pattern.columns, self.pattern.rows
            ));
        }
        if !(self.pattern.square_size.is_finite() && self.pattern.square_size > 0.0) {
            return invalid(format!(
                "square size must be positive, got {}",
                self.pattern.square_size
            ));
        }
        if self.min_samples < 3 {
            return invalid(format!(
                "min_samples must be at least 3, got {}",
                self.min_samples
            ));
        }
        if !(self.max_rms_error.is_finite() && self.max_rms_error > 0.0) {
            return invalid(format!(
                "max_rms_error must be positive, got {}",
                self.max_rms_error
            ));
        }
        Ok(())
    }
}

/// Bound applied when turning matched pixels into 3D points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriangulationConfig {
    /// Points whose mean reprojection error (pixels) exceeds this are dropped.
    pub max_reprojection_error: Real,
}

impl Default for TriangulationConfig {
    fn default() -> Self {
        Self {
            max_reprojection_error: 2.0,
        }
    }
}
