//! Core math and geometry primitives for `fishtrack`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec2`, `Pt3`, ...),
//! - the pinhole camera model with Brown–Conrady distortion,
//! - correspondence containers shared by calibration and triangulation,
//! - deterministic synthetic-data helpers used by the test suites.
//!
//! Camera pipeline:
//! `pixel = K ∘ distortion ∘ projection(p_c)`

/// Error classification shared across crates.
pub mod error;
/// Linear algebra type aliases and helpers.
pub mod math;
/// Camera intrinsics, distortion and the pinhole model.
pub mod models;
/// Observation containers.
pub mod observation;
/// Synthetic planar targets, poses and deterministic pixel noise.
pub mod synthetic;

pub use error::ErrorCategory;
pub use math::*;
pub use models::*;
pub use observation::*;
