use fishtrack_calib::CalibrationError;
use fishtrack_core::ErrorCategory;
use fishtrack_events::EventError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures opening or reading a frame source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source {} does not exist", path.display())]
    NotFound { path: PathBuf },

    #[error("required tool `{0}` not found on PATH")]
    ToolMissing(&'static str),

    #[error("probing {} failed: {message}", path.display())]
    Probe { path: PathBuf, message: String },

    #[error("source {} has no frames", path.display())]
    Empty { path: PathBuf },

    #[error("frame {index} of {} is {width}x{height}, expected {expected_width}x{expected_height}", path.display())]
    FrameSize {
        path: PathBuf,
        index: u64,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    #[error("failed to decode {}: {source}", path.display())]
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

impl SourceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("cannot read source {}: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: SourceError,
    },

    #[error("frame counts differ: {primary} primary vs {secondary} secondary")]
    FrameCountMismatch { primary: u64, secondary: u64 },

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error("upload of {} failed: {message}", path.display())]
    Upload { path: PathBuf, message: String },

    #[error("job panicked: {0}")]
    Panicked(String),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SourceUnreadable { .. } | Self::FrameCountMismatch { .. } | Self::Io { .. } => {
                ErrorCategory::Acquisition
            }
            Self::Event(e) => e.category(),
            Self::Calibration(e) => e.category(),
            Self::Upload { .. } => ErrorCategory::Acquisition,
            Self::Panicked(_) => ErrorCategory::Invariant,
        }
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, source: SourceError) -> Self {
        Self::SourceUnreadable {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = ProcessorError> = std::result::Result<T, E>;
