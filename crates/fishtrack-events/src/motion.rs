//! Frame-differencing activity segmentation.
//!
//! ```text
//!            changed fraction >= min_changed_fraction
//!     ┌───────┐ ─────────────────────────────────► ┌────────┐
//!     │ Quiet │                                    │ Moving │
//!     └───────┘ ◄───────────────────────────────── └────────┘
//!              more than max_gap quiet frames
//! ```
//!
//! Segments shorter than `min_length` frames are discarded.

use crate::activity::ActivitySegment;
use image::GrayImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Absolute intensity difference above which a pixel counts as changed.
    pub pixel_threshold: u8,
    /// Fraction of changed pixels that marks a frame as moving.
    pub min_changed_fraction: f64,
    /// Quiet frames tolerated inside one segment.
    pub max_gap: u64,
    /// Shortest segment kept, in frames.
    pub min_length: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            pixel_threshold: 25,
            min_changed_fraction: 0.002,
            max_gap: 15,
            min_length: 5,
        }
    }
}

enum State {
    Quiet,
    Moving { start: u64, last_moving: u64 },
}

pub struct MotionSegmenter {
    config: MotionConfig,
    state: State,
    previous: Option<GrayImage>,
    segments: Vec<ActivitySegment>,
    next_id: u32,
}

impl MotionSegmenter {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            state: State::Quiet,
            previous: None,
            segments: Vec::new(),
            next_id: 0,
        }
    }

    /// Fraction of pixels that changed between two frames of equal size.
    pub fn changed_fraction(&self, a: &GrayImage, b: &GrayImage) -> f64 {
        if a.dimensions() != b.dimensions() || a.is_empty() {
            return 0.0;
        }
        let changed = a
            .as_raw()
            .iter()
            .zip(b.as_raw())
            .filter(|(p, q)| p.abs_diff(**q) > self.config.pixel_threshold)
            .count();
        changed as f64 / a.as_raw().len() as f64
    }

    pub fn ingest(&mut self, index: u64, image: &GrayImage) {
        let moving = match &self.previous {
            Some(prev) => self.changed_fraction(prev, image) >= self.config.min_changed_fraction,
            None => false,
        };

        match self.state {
            State::Quiet if moving => {
                self.state = State::Moving {
                    start: index,
                    last_moving: index,
                };
            }
            State::Moving {
                ref mut last_moving,
                ..
            } if moving => *last_moving = index,
            State::Moving { start, last_moving } if index - last_moving > self.config.max_gap => {
                self.state = State::Quiet;
                self.close(start, last_moving);
            }
            _ => {}
        }

        self.previous = Some(image.clone());
    }

    fn close(&mut self, start: u64, end: u64) {
        if end - start + 1 < self.config.min_length {
            log::debug!("discarding short motion segment {start}..={end}");
            return;
        }
        let segment = ActivitySegment {
            id: self.next_id,
            start,
            end,
        };
        log::debug!("motion segment {segment:?}");
        self.next_id += 1;
        self.segments.push(segment);
    }

    pub fn finalize(mut self) -> Vec<ActivitySegment> {
        if let State::Moving { start, last_moving } = self.state {
            self.close(start, last_moving);
        }
        self.segments
    }
}
