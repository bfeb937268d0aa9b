use crate::detector::EventDetector;
use crate::error::{EventError, Result};
use crate::frame::Frame;
use crate::interval::{DetectorState, EventInterval, EventKind, IntervalCell};
use fishtrack_core::CameraSide;
use serde::{Deserialize, Serialize};

/// A frame window of foreground activity, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySegment {
    pub id: u32,
    pub start: u64,
    pub end: u64,
}

impl ActivitySegment {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Tracks one known activity window on a stream.
#[derive(Debug)]
pub struct ActivityDetector {
    cell: IntervalCell,
    id: u32,
    start: u64,
    end: u64,
    last_frame: Option<u64>,
}

impl ActivityDetector {
    pub fn new(camera: CameraSide, id: u32, start: u64, end: u64) -> Result<Self> {
        if end < start {
            return Err(EventError::InvalidRange { start, end });
        }
        Ok(Self {
            cell: IntervalCell::new(EventInterval::new(EventKind::Activity, camera, Some(id))),
            id,
            start,
            end,
            last_frame: None,
        })
    }

    pub fn from_segment(camera: CameraSide, segment: &ActivitySegment) -> Result<Self> {
        Self::new(camera, segment.id, segment.start, segment.end)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_active(&self, cursor: u64) -> bool {
        (self.start..=self.end).contains(&cursor)
    }

    /// Close at the last frame seen if the stream stopped inside the window.
    pub fn finish(&mut self) -> Result<()> {
        match self.last_frame {
            Some(last) if self.state() == DetectorState::Active => self.end_event(last),
            _ => Ok(()),
        }
    }
}

impl EventDetector for ActivityDetector {
    fn kind(&self) -> EventKind {
        EventKind::Activity
    }

    fn cell(&self) -> &IntervalCell {
        &self.cell
    }

    fn check_frame(&mut self, frame: &Frame) -> Result<()> {
        if self.is_active(frame.index) {
            self.last_frame = Some(frame.index);
        }
        match self.state() {
            DetectorState::Idle if self.is_active(frame.index) => {
                self.start_event(frame.index)?;
                log::debug!("activity {} started at frame {}", self.id, frame.index);
                if frame.index == self.end {
                    self.end_event(self.end)?;
                }
            }
            DetectorState::Active if frame.index >= self.end => {
                self.end_event(self.end)?;
                log::debug!("activity {} ended at frame {}", self.id, self.end);
            }
            _ => {}
        }
        Ok(())
    }
}
