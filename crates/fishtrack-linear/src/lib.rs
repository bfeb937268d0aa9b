//! Closed-form initialisation for stereo calibration and measurement.
//!
//! Everything here is linear (SVD based) and meant as a starting point for
//! the non-linear refinement in `fishtrack-optim`, or for direct use when
//! the inputs are already well conditioned (triangulation, rectification).

pub mod math;

mod homography;
mod planar_pose;
mod rectify;
mod stereo;
mod triangulation;
mod zhang;

pub use homography::*;
pub use planar_pose::*;
pub use rectify::*;
pub use stereo::*;
pub use triangulation::*;
pub use zhang::*;
