//! Fiducial marker decoding and the marker event detector.

use crate::detector::EventDetector;
use crate::error::Result;
use crate::frame::Frame;
use crate::geo_uri::parse_geo_uri;
use crate::interval::{EventInterval, EventKind, IntervalCell};
use fishtrack_core::{CameraSide, Pt2, Real};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A marker found in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedMarker {
    pub payload: String,
    /// Corner pixels in decoder order.
    pub corners: [Pt2; 4],
}

impl DecodedMarker {
    pub fn centroid(&self) -> Pt2 {
        let sum = self
            .corners
            .iter()
            .fold(Pt2::origin().coords, |acc, c| acc + c.coords);
        Pt2::from(sum / 4.0)
    }
}

/// Finds markers in a grayscale image.
pub trait MarkerDecoder: Send + Sync {
    fn decode(&self, image: &GrayImage) -> Vec<DecodedMarker>;
}

/// QR code decoder backed by `rqrr`.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDecoder;

impl MarkerDecoder for QrDecoder {
    fn decode(&self, image: &GrayImage) -> Vec<DecodedMarker> {
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            image.width() as usize,
            image.height() as usize,
            |x, y| image.get_pixel(x as u32, y as u32).0[0],
        );
        prepared
            .detect_grids()
            .into_iter()
            .filter_map(|grid| match grid.decode() {
                Ok((_, payload)) => Some(DecodedMarker {
                    payload,
                    corners: grid
                        .bounds
                        .map(|p| Pt2::new(p.x as Real, p.y as Real)),
                }),
                Err(e) => {
                    log::debug!("QR grid found but not decodable: {e}");
                    None
                }
            })
            .collect()
    }
}

/// Opens on the first decoded marker and closes after `miss_tolerance`
/// consecutive frames without one.
pub struct MarkerDetector {
    cell: IntervalCell,
    decoder: Arc<dyn MarkerDecoder>,
    miss_tolerance: u32,
    misses: u32,
    last_seen: Option<u64>,
}

impl std::fmt::Debug for MarkerDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkerDetector")
            .field("interval", &self.cell.lock().interval)
            .field("miss_tolerance", &self.miss_tolerance)
            .field("misses", &self.misses)
            .field("last_seen", &self.last_seen)
            .finish()
    }
}

impl MarkerDetector {
    pub fn new(camera: CameraSide, decoder: Arc<dyn MarkerDecoder>, miss_tolerance: u32) -> Self {
        Self {
            cell: IntervalCell::new(EventInterval::new(EventKind::Marker, camera, None)),
            decoder,
            miss_tolerance: miss_tolerance.max(1),
            misses: 0,
            last_seen: None,
        }
    }

    pub fn detected_any(&self) -> bool {
        self.last_seen.is_some()
    }

    /// Close an open event at the last frame with a decode.
    pub fn finish(&mut self) -> Result<()> {
        match self.last_seen {
            Some(last) if self.state() == crate::DetectorState::Active => self.end_event(last),
            _ => Ok(()),
        }
    }
}

impl EventDetector for MarkerDetector {
    fn kind(&self) -> EventKind {
        EventKind::Marker
    }

    fn cell(&self) -> &IntervalCell {
        &self.cell
    }

    fn check_frame(&mut self, frame: &Frame) -> Result<()> {
        use crate::DetectorState::*;

        let state = self.state();
        if state == Closed {
            return Ok(());
        }

        let markers = frame.markers_with(self.decoder.as_ref());
        if markers.is_empty() {
            if state == Active {
                self.misses += 1;
                if self.misses >= self.miss_tolerance {
                    let end = self.last_seen.unwrap_or(frame.index);
                    log::debug!("marker lost after {} frames, closing at {end}", self.misses);
                    self.end_event(end)?;
                }
            }
            return Ok(());
        }

        let mut guard = self.cell.lock();
        if guard.state == Idle {
            guard.start(frame.index)?;
            log::info!(
                "{} marker event started at frame {}",
                guard.interval.camera.as_str(),
                frame.index
            );
        }
        for marker in markers.iter() {
            guard.interval.payload.extend(parse_geo_uri(&marker.payload));
        }
        drop(guard);

        self.misses = 0;
        self.last_seen = Some(frame.index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_is_corner_mean() {
        let m = DecodedMarker {
            payload: String::new(),
            corners: [
                Pt2::new(0.0, 0.0),
                Pt2::new(4.0, 0.0),
                Pt2::new(4.0, 2.0),
                Pt2::new(0.0, 2.0),
            ],
        };
        assert_eq!(m.centroid(), Pt2::new(2.0, 1.0));
    }

    #[test]
    fn blank_image_has_no_qr_codes() {
        let img = GrayImage::from_pixel(64, 48, image::Luma([255]));
        assert!(QrDecoder.decode(&img).is_empty());
    }
}
