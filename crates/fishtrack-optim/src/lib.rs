//! Non-linear least-squares refinement for camera calibration.
//!
//! Problems implement [`NllsProblem`]; [`LmBackend`] drives them with the
//! dense Levenberg-Marquardt solver from the `levenberg-marquardt` crate.
//! Reprojection problems differentiate their residuals with `num-dual`.

mod backend_lm;
pub mod mono;
pub mod params;
mod residual;
pub mod stereo;
mod traits;

pub use backend_lm::LmBackend;
pub use mono::{refine_mono, MonoProblem, MonoRefinement};
pub use stereo::{refine_stereo, StereoEstimate, StereoProblem, StereoRefinement};
pub use traits::*;
