#![allow(dead_code)]

use fishtrack_calib::{CalibrationMode, CalibrationResult, CameraCalibration, StereoGeometry};
use fishtrack_core::{BrownConrady, CameraIntrinsics, Iso3, PinholeCamera, Pt2, Pt3, Vec3};
use fishtrack_events::{DecodedMarker, MarkerDecoder};
use fishtrack_linear::{essential_matrix, fundamental_matrix, stereo_rectify};
use image::{GrayImage, Luma};
use nalgebra::{Translation3, UnitQuaternion};
use std::collections::HashMap;

pub fn primary_camera() -> PinholeCamera {
    PinholeCamera::new(
        CameraIntrinsics {
            fx: 1200.0,
            fy: 1198.0,
            cx: 640.0,
            cy: 480.0,
            skew: 0.0,
        },
        BrownConrady::from_array([-0.1, 0.02, 0.0004, -0.0002, 0.0]),
    )
}

pub fn secondary_camera() -> PinholeCamera {
    PinholeCamera::new(
        CameraIntrinsics {
            fx: 1190.0,
            fy: 1192.0,
            cx: 636.0,
            cy: 484.0,
            skew: 0.0,
        },
        BrownConrady::from_array([-0.09, 0.015, -0.0003, 0.0001, 0.0]),
    )
}

pub fn secondary_from_primary() -> Iso3 {
    Iso3::from_parts(
        Translation3::new(-0.1, 0.002, 0.004),
        UnitQuaternion::from_scaled_axis(Vec3::new(0.005, 0.05, -0.003)),
    )
}

pub fn stereo_result() -> CalibrationResult {
    let p = primary_camera();
    let s = secondary_camera();
    let rel = secondary_from_primary();
    let rotation = rel.rotation.to_rotation_matrix().into_inner();
    let translation = rel.translation.vector;
    let essential = essential_matrix(&rotation, &translation);
    CalibrationResult {
        mode: CalibrationMode::Stereo,
        image_width: 1280,
        image_height: 960,
        primary: CameraCalibration {
            intrinsics: p.intrinsics,
            distortion: p.distortion,
            rms_error: 0.0,
        },
        secondary: Some(CameraCalibration {
            intrinsics: s.intrinsics,
            distortion: s.distortion,
            rms_error: 0.0,
        }),
        stereo: Some(StereoGeometry {
            rotation,
            translation,
            essential,
            fundamental: fundamental_matrix(
                &p.intrinsics.k_matrix(),
                &s.intrinsics.k_matrix(),
                &essential,
            )
            .unwrap(),
            rms_error: 0.0,
            rectification: stereo_rectify(&p.intrinsics, &s.intrinsics, &rotation, &translation)
                .unwrap(),
        }),
    }
}

/// Pixels of `point` (primary frame) in both cameras.
pub fn project_pair(point: &Pt3) -> (Pt2, Pt2) {
    let in_secondary = secondary_from_primary() * point;
    (
        primary_camera().project(point).unwrap(),
        secondary_camera().project(&in_secondary).unwrap(),
    )
}

pub fn marker_at(payload: &str, center: Pt2) -> DecodedMarker {
    DecodedMarker {
        payload: payload.to_string(),
        corners: [
            Pt2::new(center.x - 3.0, center.y - 3.0),
            Pt2::new(center.x + 3.0, center.y - 3.0),
            Pt2::new(center.x + 3.0, center.y + 3.0),
            Pt2::new(center.x - 3.0, center.y + 3.0),
        ],
    }
}

/// Frame image tagged with its index and camera so a [`ScriptedDecoder`]
/// can recognize it.
pub fn tagged_frame(index: u8, camera: u8) -> GrayImage {
    let mut img = GrayImage::new(4, 2);
    img.put_pixel(0, 0, Luma([index]));
    img.put_pixel(1, 0, Luma([camera]));
    img
}

/// Returns preset markers for tagged frames.
#[derive(Default)]
pub struct ScriptedDecoder {
    markers: HashMap<(u8, u8), Vec<DecodedMarker>>,
}

impl ScriptedDecoder {
    pub fn add(&mut self, index: u8, camera: u8, marker: DecodedMarker) {
        self.markers.entry((index, camera)).or_default().push(marker);
    }
}

impl MarkerDecoder for ScriptedDecoder {
    fn decode(&self, image: &GrayImage) -> Vec<DecodedMarker> {
        let key = (image.get_pixel(0, 0).0[0], image.get_pixel(1, 0).0[0]);
        self.markers.get(&key).cloned().unwrap_or_default()
    }
}
