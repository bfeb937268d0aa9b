use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification shared by every error type in the workspace.
///
/// Callers use it to decide whether a failure ends the whole operation, the
/// owning job, or just the current unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Bad dimensions, unsupported modes, malformed files. Fatal to the operation.
    Configuration,
    /// Unreadable video or image source. Fatal to the owning job.
    Acquisition,
    /// Pattern or correspondence missing on one unit. The unit is skipped.
    Detection,
    /// Non-convergence or a residual over its bound. The computation is discarded.
    Numerical,
    /// A state-machine or bookkeeping contract was broken.
    Invariant,
}

impl ErrorCategory {
    /// Whether the surrounding job may continue past an error of this category.
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::Detection | Self::Numerical)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::Acquisition => "acquisition",
            Self::Detection => "detection",
            Self::Numerical => "numerical",
            Self::Invariant => "invariant",
        };
        f.write_str(name)
    }
}
