//! Interval bookkeeping shared between a detector and its readers.
//!
//! A detector owns an [`IntervalCell`]; every read or write of the bounds and
//! payload goes through its mutex. Other threads observe the same state
//! through an [`IntervalHandle`] and only ever see whole snapshots.

use crate::error::{EventError, Result};
use fishtrack_core::CameraSide;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Marker,
    Activity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorState {
    Idle,
    Active,
    Closed,
}

/// A tagged window of frames on one camera stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInterval {
    pub kind: EventKind,
    pub camera: CameraSide,
    /// Segment id for activity events; markers carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    /// `None` until the event starts.
    pub start_frame: Option<u64>,
    /// Inclusive; `None` while the event is open.
    pub end_frame: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub payload: BTreeMap<String, String>,
}

impl EventInterval {
    pub fn new(kind: EventKind, camera: CameraSide, id: Option<u32>) -> Self {
        Self {
            kind,
            camera,
            id,
            start_frame: None,
            end_frame: None,
            payload: BTreeMap::new(),
        }
    }

    /// Number of frames covered once closed.
    pub fn len(&self) -> Option<u64> {
        Some(self.end_frame? - self.start_frame? + 1)
    }

    pub fn contains(&self, frame: u64) -> bool {
        match (self.start_frame, self.end_frame) {
            (Some(start), Some(end)) => (start..=end).contains(&frame),
            (Some(start), None) => frame >= start,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntervalState {
    pub state: DetectorState,
    pub interval: EventInterval,
}

impl IntervalState {
    /// `Idle -> Active`.
    pub fn start(&mut self, frame: u64) -> Result<()> {
        if self.state != DetectorState::Idle {
            return Err(EventError::DoubleStart {
                kind: self.interval.kind,
                state: self.state,
                frame,
            });
        }
        self.state = DetectorState::Active;
        self.interval.start_frame = Some(frame);
        Ok(())
    }

    /// `Active -> Closed`, with `frame` as the inclusive end.
    pub fn end(&mut self, frame: u64) -> Result<()> {
        let kind = self.interval.kind;
        match self.state {
            DetectorState::Idle => Err(EventError::PrematureEnd { kind, frame }),
            DetectorState::Closed => Err(EventError::DoubleEnd { kind, frame }),
            DetectorState::Active => {
                let start = self.interval.start_frame.unwrap_or(frame);
                if frame < start {
                    return Err(EventError::InvalidRange { start, end: frame });
                }
                self.state = DetectorState::Closed;
                self.interval.end_frame = Some(frame);
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntervalCell {
    inner: Arc<Mutex<IntervalState>>,
}

impl IntervalCell {
    pub fn new(interval: EventInterval) -> Self {
        Self {
            inner: Arc::new(Mutex::new(IntervalState {
                state: DetectorState::Idle,
                interval,
            })),
        }
    }

    /// Lock the state. A poisoned lock still holds consistent data because
    /// every transition is applied in a single assignment step.
    pub fn lock(&self) -> MutexGuard<'_, IntervalState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn handle(&self) -> IntervalHandle {
        IntervalHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Read-only view of a detector's interval, usable from any thread.
#[derive(Debug, Clone)]
pub struct IntervalHandle {
    inner: Arc<Mutex<IntervalState>>,
}

impl IntervalHandle {
    pub fn snapshot(&self) -> EventInterval {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .interval
            .clone()
    }

    pub fn state(&self) -> DetectorState {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn cell() -> IntervalCell {
        IntervalCell::new(EventInterval::new(
            EventKind::Marker,
            CameraSide::Primary,
            None,
        ))
    }

    #[test]
    fn lifecycle_and_errors() {
        let cell = cell();
        assert_eq!(
            cell.lock().end(3),
            Err(EventError::PrematureEnd {
                kind: EventKind::Marker,
                frame: 3
            })
        );
        cell.lock().start(5).unwrap();
        assert!(matches!(
            cell.lock().start(6),
            Err(EventError::DoubleStart {
                state: DetectorState::Active,
                ..
            })
        ));
        assert_eq!(
            cell.lock().end(4),
            Err(EventError::InvalidRange { start: 5, end: 4 })
        );
        cell.lock().end(9).unwrap();
        assert!(matches!(cell.lock().end(10), Err(EventError::DoubleEnd { .. })));
        assert!(matches!(
            cell.lock().start(11),
            Err(EventError::DoubleStart {
                state: DetectorState::Closed,
                ..
            })
        ));

        let interval = cell.handle().snapshot();
        assert_eq!(interval.len(), Some(5));
        assert!(interval.contains(9) && !interval.contains(10));
    }

    #[test]
    fn handle_reads_from_another_thread() {
        let cell = cell();
        let handle = cell.handle();
        {
            let mut state = cell.lock();
            state.start(2).unwrap();
            state.interval.payload.insert("site".into(), "weir".into());
        }
        let snap = thread::spawn(move || (handle.state(), handle.snapshot()))
            .join()
            .unwrap();
        assert_eq!(snap.0, DetectorState::Active);
        assert_eq!(snap.1.start_frame, Some(2));
        assert_eq!(snap.1.payload["site"], "weir");
    }
}
