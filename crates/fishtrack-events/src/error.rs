use crate::interval::{DetectorState, EventKind};
use fishtrack_core::ErrorCategory;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("{kind:?} event started at frame {frame} while {state:?}")]
    DoubleStart {
        kind: EventKind,
        state: DetectorState,
        frame: u64,
    },

    #[error("{kind:?} event ended at frame {frame} before it started")]
    PrematureEnd { kind: EventKind, frame: u64 },

    #[error("{kind:?} event ended twice (again at frame {frame})")]
    DoubleEnd { kind: EventKind, frame: u64 },

    #[error("invalid event range: end {end} is before start {start}")]
    InvalidRange { start: u64, end: u64 },
}

impl EventError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DoubleStart { .. }
            | Self::PrematureEnd { .. }
            | Self::DoubleEnd { .. }
            | Self::InvalidRange { .. } => ErrorCategory::Invariant,
        }
    }
}

pub type Result<T, E = EventError> = std::result::Result<T, E>;
