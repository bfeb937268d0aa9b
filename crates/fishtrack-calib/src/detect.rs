//! Calibration-pattern detectors.
//!
//! A detector turns one image into board/pixel correspondences, or reports
//! that the full pattern is not visible.

use crate::config::PatternSpec;
use crate::error::{CalibrationError, Result};
use fishtrack_core::{CorrespondenceView, Pt2, Real};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub trait PatternDetector: Send + Sync {
    /// Detect the pattern in `image`. `Ok(None)` means the pattern was not found.
    fn detect(&self, image: &Path, pattern: &PatternSpec) -> Result<Option<CorrespondenceView>>;
}

/// Build a view from labelled corners `(i, j, pixel)`.
///
/// The pattern counts as found only when every inner corner is present exactly
/// once. Points are ordered row-major so both cameras of a pair agree.
pub fn view_from_grid_corners(
    corners: impl IntoIterator<Item = (usize, usize, Pt2)>,
    pattern: &PatternSpec,
) -> Option<CorrespondenceView> {
    let mut grid = BTreeMap::new();
    for (i, j, px) in corners {
        if i >= pattern.columns || j >= pattern.rows {
            return None;
        }
        if grid.insert((j, i), px).is_some() {
            return None;
        }
    }
    if grid.len() != pattern.corner_count() {
        return None;
    }

    let (points_3d, points_2d) = grid
        .into_iter()
        .map(|((j, i), px)| (pattern.corner_position(i, j), px))
        .unzip();
    CorrespondenceView::new(points_3d, points_2d).ok()
}

#[derive(Debug, Deserialize)]
struct CornerFile {
    corners: Vec<[Real; 4]>,
}

/// Reads pre-detected corners from a JSON sidecar next to each image.
///
/// For `board_07.png` the sidecar is `board_07.png.corners.json` containing
/// `{"corners": [[i, j, x, y], ...]}`. A missing sidecar means "not found".
#[derive(Debug, Clone, Copy, Default)]
pub struct CornerFileDetector;

impl CornerFileDetector {
    pub fn sidecar_path(image: &Path) -> PathBuf {
        let mut name = image.file_name().unwrap_or_default().to_os_string();
        name.push(".corners.json");
        image.with_file_name(name)
    }
}

impl PatternDetector for CornerFileDetector {
    fn detect(&self, image: &Path, pattern: &PatternSpec) -> Result<Option<CorrespondenceView>> {
        let sidecar = Self::sidecar_path(image);
        if !sidecar.exists() {
            log::debug!("no corner sidecar for {}", image.display());
            return Ok(None);
        }
        let text = fs::read_to_string(&sidecar).map_err(|e| CalibrationError::io(&sidecar, e))?;
        let file: CornerFile = serde_json::from_str(&text).map_err(|source| {
            CalibrationError::MalformedCorrespondenceFile {
                path: sidecar.clone(),
                source,
            }
        })?;

        let corners = file.corners.iter().filter_map(|[i, j, x, y]| {
            (*i >= 0.0 && *j >= 0.0).then(|| (*i as usize, *j as usize, Pt2::new(*x, *y)))
        });
        Ok(view_from_grid_corners(corners, pattern))
    }
}

/// Detects chessboard corners in the image pixels.
#[cfg(feature = "chessboard")]
#[derive(Debug, Clone, Default)]
pub struct ChessboardDetector {
    pub chess_config: chess_corners::ChessConfig,
}

#[cfg(feature = "chessboard")]
impl PatternDetector for ChessboardDetector {
    fn detect(&self, image: &Path, pattern: &PatternSpec) -> Result<Option<CorrespondenceView>> {
        use calib_targets::{detect, ChessboardParams};

        let img = image::ImageReader::open(image)
            .map_err(|e| CalibrationError::io(image, e))?
            .decode()
            .map_err(|source| CalibrationError::Image {
                path: image.to_path_buf(),
                source,
            })?
            .to_luma8();

        let params = ChessboardParams {
            expected_rows: Some(pattern.rows as u32),
            expected_cols: Some(pattern.columns as u32),
            ..ChessboardParams::default()
        };
        let Some(detection) = detect::detect_chessboard(&img, &self.chess_config, params) else {
            return Ok(None);
        };

        let corners = detection.detection.corners.iter().filter_map(|corner| {
            let grid = corner.grid.as_ref()?;
            Some((
                grid.i as usize,
                grid.j as usize,
                Pt2::new(corner.position.x as Real, corner.position.y as Real),
            ))
        });
        Ok(view_from_grid_corners(corners, pattern))
    }
}
