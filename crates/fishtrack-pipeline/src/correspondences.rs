//! Matching points between synchronized primary and secondary frames.

use fishtrack_calib::{CalibrationError, PointCorrespondences};
use fishtrack_core::PointPair;
use fishtrack_events::{Frame, MarkerDecoder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// A matched pixel pair and what it was matched on.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledPair {
    pub label: String,
    pub pair: PointPair,
}

/// Finds pixel pairs observing the same physical point in two frames.
pub trait CorrespondenceFinder: Send + Sync {
    fn find(&self, primary: &Frame, secondary: &Frame) -> Vec<LabeledPair>;
}

/// Pairs markers decoded in both views by payload; the marker centroid is
/// the matched point. Payloads seen more than once in a view are ambiguous
/// and skipped.
pub struct MarkerCorrespondences {
    decoder: Arc<dyn MarkerDecoder>,
}

impl MarkerCorrespondences {
    pub fn new(decoder: Arc<dyn MarkerDecoder>) -> Self {
        Self { decoder }
    }
}

impl CorrespondenceFinder for MarkerCorrespondences {
    fn find(&self, primary: &Frame, secondary: &Frame) -> Vec<LabeledPair> {
        let index = |frame: &Frame| {
            let mut by_payload: BTreeMap<String, Vec<_>> = BTreeMap::new();
            for marker in frame.markers_with(self.decoder.as_ref()).iter() {
                by_payload
                    .entry(marker.payload.clone())
                    .or_default()
                    .push(marker.centroid());
            }
            by_payload
        };
        let secondary = index(secondary);

        index(primary)
            .into_iter()
            .filter_map(|(payload, p)| {
                let s = secondary.get(&payload)?;
                if p.len() != 1 || s.len() != 1 {
                    log::debug!("marker {payload:?} is ambiguous, skipping");
                    return None;
                }
                Some(LabeledPair {
                    label: payload,
                    pair: PointPair::new(p[0], s[0]),
                })
            })
            .collect()
    }
}

/// Correspondences supplied up front, keyed by frame index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuppliedCorrespondences {
    pub frames: BTreeMap<u64, PointCorrespondences>,
}

impl SuppliedCorrespondences {
    /// Read a `{"frames": {"<index>": {"primary": [...], "secondary": [...]}}}` file.
    ///
    /// Every frame entry must pair up.
    pub fn load(path: &Path) -> Result<Self, CalibrationError> {
        let text = fs::read_to_string(path).map_err(|source| CalibrationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let supplied: Self = serde_json::from_str(&text).map_err(|source| {
            CalibrationError::MalformedCorrespondenceFile {
                path: path.to_path_buf(),
                source,
            }
        })?;
        for entry in supplied.frames.values() {
            entry.pairs()?;
        }
        Ok(supplied)
    }
}

impl CorrespondenceFinder for SuppliedCorrespondences {
    fn find(&self, primary: &Frame, _secondary: &Frame) -> Vec<LabeledPair> {
        let Some(entry) = self.frames.get(&primary.index) else {
            return Vec::new();
        };
        match entry.pairs() {
            Ok(pairs) => pairs
                .into_iter()
                .enumerate()
                .map(|(i, pair)| LabeledPair {
                    label: i.to_string(),
                    pair,
                })
                .collect(),
            Err(e) => {
                log::warn!("frame {}: {e}", primary.index);
                Vec::new()
            }
        }
    }
}
