//! Lock-step processing of one synchronized video pair.
//!
//! Both streams are read frame by frame. Every frame feeds the live event
//! detectors of its stream, then the pair is searched for correspondences
//! which are triangulated with the stereo calibration. Frames are assumed to
//! be synchronized by capture; only the frame counts are checked.

use crate::config::ProcessorConfig;
use crate::correspondences::{CorrespondenceFinder, MarkerCorrespondences};
use crate::error::{ProcessorError, Result};
use crate::source::{FrameSource, SourceOpener};
use fishtrack_calib::{
    CalibrationResult, StereoTriangulator, TriangulatedPoint, TriangulationConfig,
};
use fishtrack_core::CameraSide;
use fishtrack_events::{
    ActivityDetector, ActivitySegment, Detector, EventDetector, EventInterval, Frame,
    MarkerDecoder, MarkerDetector, MotionSegmenter, QrDecoder,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What a completed run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessingReport {
    pub frames_processed: u64,
    pub events: Vec<EventInterval>,
    pub points: Vec<TriangulatedPoint>,
    /// Frames on which detection or triangulation failed and was skipped.
    pub skipped_frames: u64,
}

/// Detectors of one camera stream.
struct StreamDetectors {
    camera: CameraSide,
    decoder: Arc<dyn MarkerDecoder>,
    miss_tolerance: u32,
    detectors: Vec<Detector>,
    current_marker: Option<usize>,
    segments: Vec<ActivitySegment>,
    next_segment: usize,
}

impl StreamDetectors {
    fn new(
        camera: CameraSide,
        decoder: Arc<dyn MarkerDecoder>,
        miss_tolerance: u32,
        mut segments: Vec<ActivitySegment>,
    ) -> Self {
        segments.sort_by_key(|s| (s.start, s.id));
        Self {
            camera,
            decoder,
            miss_tolerance,
            detectors: Vec::new(),
            current_marker: None,
            segments,
            next_segment: 0,
        }
    }

    /// Instantiate detectors due at `cursor`.
    fn spawn_due(&mut self, cursor: u64) -> Result<()> {
        let marker_closed = self
            .current_marker
            .map_or(true, |i| self.detectors[i].is_closed());
        if marker_closed {
            let marker = MarkerDetector::new(self.camera, Arc::clone(&self.decoder), self.miss_tolerance);
            self.current_marker = Some(self.detectors.len());
            self.detectors.push(marker.into());
        }

        while let Some(segment) = self.segments.get(self.next_segment) {
            if segment.start > cursor {
                break;
            }
            self.next_segment += 1;
            if segment.end < cursor {
                log::warn!(
                    "{} activity {} ended before frame {cursor}, skipping",
                    self.camera.as_str(),
                    segment.id
                );
                continue;
            }
            let detector = ActivityDetector::from_segment(self.camera, segment)?;
            self.detectors.push(detector.into());
        }
        Ok(())
    }

    /// Feed a frame to every live detector. Returns `false` if any of them failed.
    fn check_frame(&mut self, frame: &Frame) -> bool {
        let mut ok = true;
        for detector in self.detectors.iter_mut().filter(|d| !d.is_closed()) {
            if let Err(e) = detector.check_frame(frame) {
                let level = if e.category().is_recoverable() {
                    log::Level::Warn
                } else {
                    log::Level::Error
                };
                log::log!(
                    level,
                    "{} frame {}: {:?} detector failed: {e}",
                    self.camera.as_str(),
                    frame.index,
                    detector.kind()
                );
                ok = false;
            }
        }
        ok
    }

    /// Close open detectors and return every interval that started.
    fn finish(mut self) -> Vec<EventInterval> {
        for detector in &mut self.detectors {
            if let Err(e) = detector.finish() {
                log::warn!("{} detector could not close: {e}", self.camera.as_str());
            }
        }
        self.detectors
            .iter()
            .map(|d| d.interval())
            .filter(|i| i.start_frame.is_some())
            .collect()
    }
}

/// Processes one primary/secondary video pair.
pub struct Processor {
    primary: Box<dyn FrameSource>,
    secondary: Box<dyn FrameSource>,
    frame_count: u64,
    config: ProcessorConfig,
    decoder: Arc<dyn MarkerDecoder>,
    /// Supplied correspondence source; marker matching with `decoder` when unset.
    finder: Option<Box<dyn CorrespondenceFinder>>,
    triangulator: Option<StereoTriangulator>,
    segments: Option<Vec<ActivitySegment>>,
}

impl Processor {
    /// Open both sources and check that their frame counts agree.
    pub fn construct(
        primary: &Path,
        secondary: &Path,
        opener: &dyn SourceOpener,
        config: ProcessorConfig,
    ) -> Result<Self> {
        let open = |path: &Path| {
            opener
                .open(path)
                .map_err(|e| ProcessorError::unreadable(path, e))
        };
        let primary = open(primary)?;
        let secondary = open(secondary)?;
        Self::from_sources(primary, secondary, config)
    }

    pub fn from_sources(
        primary: Box<dyn FrameSource>,
        secondary: Box<dyn FrameSource>,
        config: ProcessorConfig,
    ) -> Result<Self> {
        for source in [&primary, &secondary] {
            if source.frame_count() == 0 {
                return Err(ProcessorError::unreadable(
                    source.path(),
                    crate::error::SourceError::Empty {
                        path: source.path().to_path_buf(),
                    },
                ));
            }
        }

        let (np, ns) = (primary.frame_count(), secondary.frame_count());
        let frame_count = if np == ns {
            np
        } else if config.allow_frame_count_mismatch {
            log::warn!(
                "frame counts differ ({np} vs {ns}), processing the first {} frames",
                np.min(ns)
            );
            np.min(ns)
        } else {
            return Err(ProcessorError::FrameCountMismatch {
                primary: np,
                secondary: ns,
            });
        };

        Ok(Self {
            primary,
            secondary,
            frame_count,
            finder: None,
            decoder: Arc::new(QrDecoder),
            config,
            triangulator: None,
            segments: None,
        })
    }

    /// Triangulate correspondences with a stereo calibration.
    pub fn with_calibration(mut self, calibration: &CalibrationResult) -> Result<Self> {
        self.triangulator = Some(StereoTriangulator::new(
            calibration,
            self.config.triangulation,
        )?);
        Ok(self)
    }

    /// Replace the QR decoder used by marker detectors and, unless a finder
    /// was supplied, by marker matching.
    pub fn with_decoder(mut self, decoder: Arc<dyn MarkerDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Take correspondences from `finder` instead of matching markers.
    /// Applies regardless of the order of the builder calls.
    pub fn with_correspondences(mut self, finder: Box<dyn CorrespondenceFinder>) -> Self {
        self.finder = Some(finder);
        self
    }

    /// Use known activity segments instead of the motion pre-pass.
    pub fn with_activity_segments(mut self, segments: Vec<ActivitySegment>) -> Self {
        self.segments = Some(segments);
        self
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn primary_path(&self) -> &Path {
        self.primary.path()
    }

    pub fn secondary_path(&self) -> &Path {
        self.secondary.path()
    }

    fn motion_segments(&mut self, side: CameraSide) -> Result<Vec<ActivitySegment>> {
        let Some(config) = self.config.motion.clone() else {
            return Ok(Vec::new());
        };
        let frame_count = self.frame_count;
        let source = match side {
            CameraSide::Primary => &mut self.primary,
            CameraSide::Secondary => &mut self.secondary,
        };
        let path = source_path(source.as_ref());
        let unreadable = |e| ProcessorError::unreadable(&path, e);

        let mut segmenter = MotionSegmenter::new(config);
        while let Some(frame) = source.next_frame().map_err(unreadable)? {
            if frame.index >= frame_count {
                break;
            }
            segmenter.ingest(frame.index, &frame.image);
        }
        source.rewind().map_err(unreadable)?;

        let segments = segmenter.finalize();
        log::info!(
            "{} motion pre-pass found {} activity segment(s)",
            side.as_str(),
            segments.len()
        );
        Ok(segments)
    }

    /// Run the frame loop to completion.
    ///
    /// Per-frame problems are logged and skipped; only source failures abort.
    pub fn process_videos(&mut self) -> Result<ProcessingReport> {
        let (primary_segments, secondary_segments) = match self.segments.clone() {
            Some(segments) => (segments.clone(), segments),
            None => (
                self.motion_segments(CameraSide::Primary)?,
                self.motion_segments(CameraSide::Secondary)?,
            ),
        };

        let tolerance = self.config.miss_tolerance;
        let mut primary_detectors = StreamDetectors::new(
            CameraSide::Primary,
            Arc::clone(&self.decoder),
            tolerance,
            primary_segments,
        );
        let mut secondary_detectors = StreamDetectors::new(
            CameraSide::Secondary,
            Arc::clone(&self.decoder),
            tolerance,
            secondary_segments,
        );

        let marker_finder;
        let finder: &dyn CorrespondenceFinder = match &self.finder {
            Some(finder) => finder.as_ref(),
            None => {
                marker_finder = MarkerCorrespondences::new(Arc::clone(&self.decoder));
                &marker_finder
            }
        };

        let mut report = ProcessingReport::default();
        for cursor in 0..self.frame_count {
            let primary_frame = next_frame(self.primary.as_mut(), cursor)?;
            let secondary_frame = next_frame(self.secondary.as_mut(), cursor)?;

            primary_detectors.spawn_due(cursor)?;
            secondary_detectors.spawn_due(cursor)?;
            let mut frame_ok = primary_detectors.check_frame(&primary_frame);
            frame_ok &= secondary_detectors.check_frame(&secondary_frame);

            let pairs = finder.find(&primary_frame, &secondary_frame);
            if let Some(triangulator) = &self.triangulator {
                if pairs.is_empty() {
                    log::debug!("frame {cursor}: no correspondences");
                }
                for labeled in &pairs {
                    match triangulator.triangulate(&labeled.pair, Some(cursor), &labeled.label) {
                        Some(point) => report.points.push(point),
                        None => frame_ok = false,
                    }
                }
            }

            if !frame_ok {
                report.skipped_frames += 1;
            }
            report.frames_processed += 1;
        }

        report.events = primary_detectors.finish();
        report.events.extend(secondary_detectors.finish());
        log::info!(
            "processed {} frames of {}: {} events, {} points, {} frames with skipped work",
            report.frames_processed,
            self.primary.path().display(),
            report.events.len(),
            report.points.len(),
            report.skipped_frames
        );
        Ok(report)
    }

    /// Standalone triangulation of a correspondence file.
    pub fn triangulate_points(
        point_config_path: &Path,
        calibration_path: &Path,
        config: TriangulationConfig,
    ) -> Result<Vec<TriangulatedPoint>> {
        Ok(fishtrack_calib::triangulate_points(
            point_config_path,
            calibration_path,
            config,
        )?)
    }
}

fn source_path(source: &dyn FrameSource) -> PathBuf {
    source.path().to_path_buf()
}

fn next_frame(source: &mut dyn FrameSource, cursor: u64) -> Result<Frame> {
    let path = source_path(source);
    match source.next_frame() {
        Ok(Some(frame)) => Ok(frame),
        Ok(None) => Err(ProcessorError::unreadable(
            &path,
            crate::error::SourceError::Probe {
                path: path.clone(),
                message: format!("stream ended before frame {cursor}"),
            },
        )),
        Err(e) => Err(ProcessorError::unreadable(&path, e)),
    }
}
