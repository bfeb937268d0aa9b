//! Event detectors that scan a camera stream frame by frame.
//!
//! Each detector tags one window of frames: [`MarkerDetector`] the span in
//! which a QR marker stays visible, [`ActivityDetector`] a known activity
//! segment (supplied, or found by [`MotionSegmenter`]). Detectors move
//! through `Idle -> Active -> Closed` exactly once and keep their interval in
//! an [`IntervalCell`] that other threads read through an [`IntervalHandle`].

mod activity;
mod detector;
mod error;
mod frame;
pub mod geo_uri;
mod interval;
mod marker;
pub mod motion;

pub use activity::{ActivityDetector, ActivitySegment};
pub use detector::{Detector, EventDetector};
pub use error::{EventError, Result};
pub use frame::Frame;
pub use geo_uri::parse_geo_uri;
pub use interval::{
    DetectorState, EventInterval, EventKind, IntervalCell, IntervalHandle, IntervalState,
};
pub use marker::{DecodedMarker, MarkerDecoder, MarkerDetector, QrDecoder};
pub use motion::{MotionConfig, MotionSegmenter};
