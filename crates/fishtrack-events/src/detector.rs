use crate::activity::ActivityDetector;
use crate::error::Result;
use crate::frame::Frame;
use crate::interval::{DetectorState, EventInterval, EventKind, IntervalCell, IntervalHandle};
use crate::marker::MarkerDetector;

/// A per-stream detector with an `Idle -> Active -> Closed` lifecycle.
///
/// Implementors provide `check_frame`; the transitions and readers default to
/// the interval cell so every access happens under its lock.
pub trait EventDetector {
    fn kind(&self) -> EventKind;

    fn cell(&self) -> &IntervalCell;

    /// Examine one frame, starting or ending the event as needed.
    fn check_frame(&mut self, frame: &Frame) -> Result<()>;

    fn start_event(&mut self, frame: u64) -> Result<()> {
        self.cell().lock().start(frame)
    }

    fn end_event(&mut self, frame: u64) -> Result<()> {
        self.cell().lock().end(frame)
    }

    fn state(&self) -> DetectorState {
        self.cell().lock().state
    }

    fn interval(&self) -> EventInterval {
        self.cell().lock().interval.clone()
    }

    fn handle(&self) -> IntervalHandle {
        self.cell().handle()
    }

    fn is_closed(&self) -> bool {
        self.state() == DetectorState::Closed
    }
}

#[derive(Debug)]
pub enum Detector {
    Marker(MarkerDetector),
    Activity(ActivityDetector),
}

impl Detector {
    /// Close anything still open at the end of the stream.
    pub fn finish(&mut self) -> Result<()> {
        match self {
            Self::Marker(d) => d.finish(),
            Self::Activity(d) => d.finish(),
        }
    }
}

impl From<MarkerDetector> for Detector {
    fn from(d: MarkerDetector) -> Self {
        Self::Marker(d)
    }
}

impl From<ActivityDetector> for Detector {
    fn from(d: ActivityDetector) -> Self {
        Self::Activity(d)
    }
}

impl EventDetector for Detector {
    fn kind(&self) -> EventKind {
        match self {
            Self::Marker(_) => EventKind::Marker,
            Self::Activity(_) => EventKind::Activity,
        }
    }

    fn cell(&self) -> &IntervalCell {
        match self {
            Self::Marker(d) => d.cell(),
            Self::Activity(d) => d.cell(),
        }
    }

    fn check_frame(&mut self, frame: &Frame) -> Result<()> {
        match self {
            Self::Marker(d) => d.check_frame(frame),
            Self::Activity(d) => d.check_frame(frame),
        }
    }
}
