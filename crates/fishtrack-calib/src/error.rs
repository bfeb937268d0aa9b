use fishtrack_core::ErrorCategory;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("calibration pattern not found in {}", path.display())]
    PatternNotFound { path: PathBuf },

    #[error("only {found} usable calibration samples, need at least {required}")]
    InsufficientSamples { found: usize, required: usize },

    #[error("calibration did not converge: {0}")]
    CalibrationDidNotConverge(String),

    #[error("malformed calibration file {}: {source}", path.display())]
    MalformedCalibrationFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed correspondence file {}: {source}", path.display())]
    MalformedCorrespondenceFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("correspondence count mismatch: {primary} primary vs {secondary} secondary points")]
    CorrespondenceCountMismatch { primary: usize, secondary: usize },

    #[error("triangulation failed: {0}")]
    Triangulation(String),

    #[error("failed to read image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CalibrationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidConfiguration(_)
            | Self::MalformedCalibrationFile { .. }
            | Self::MalformedCorrespondenceFile { .. } => ErrorCategory::Configuration,
            Self::Io { .. } | Self::Image { .. } => ErrorCategory::Acquisition,
            Self::PatternNotFound { .. } => ErrorCategory::Detection,
            Self::InsufficientSamples { .. }
            | Self::CalibrationDidNotConverge(_)
            | Self::Triangulation(_) => ErrorCategory::Numerical,
            Self::CorrespondenceCountMismatch { .. } => ErrorCategory::Invariant,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = CalibrationError> = std::result::Result<T, E>;
