//! Stereo camera calibration for the fish tracking pipeline.
//!
//! [`Calibration`] gathers chessboard observations from image folders (or
//! directly through [`Calibration::add_stereo_sample`]), solves intrinsics,
//! distortion and the relative pose, and produces a [`CalibrationResult`]
//! that is saved as JSON. [`StereoTriangulator`] turns matched pixels into
//! 3D points with that result.

mod calibration;
pub mod config;
pub mod detect;
mod error;
pub mod io;
mod maps;
mod result;
mod solve;
mod triangulate;

pub use calibration::Calibration;
pub use config::{CalibrationInput, CalibrationMode, PatternSpec, TriangulationConfig};
#[cfg(feature = "chessboard")]
pub use detect::ChessboardDetector;
pub use detect::{CornerFileDetector, PatternDetector};
pub use error::{CalibrationError, Result};
pub use maps::RectificationMaps;
pub use result::{CalibrationResult, CameraCalibration, StereoGeometry};
pub use triangulate::{triangulate_points, PointCorrespondences, StereoTriangulator, TriangulatedPoint};
