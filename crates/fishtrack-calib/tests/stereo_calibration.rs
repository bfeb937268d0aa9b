use fishtrack_calib::{
    triangulate_points, Calibration, CalibrationError, CalibrationInput, CalibrationMode,
    CalibrationResult, CameraCalibration, CornerFileDetector, PatternSpec, RectificationMaps,
    StereoGeometry, StereoTriangulator, TriangulationConfig,
};
use fishtrack_core::synthetic::{board_poses, project_view, UniformPixelNoise};
use fishtrack_core::{
    BrownConrady, CameraIntrinsics, CameraSide, ErrorCategory, Iso3, PinholeCamera, PointPair, Pt3,
    StereoView, Vec3,
};
use fishtrack_linear::{essential_matrix, fundamental_matrix, stereo_rectify};
use nalgebra::{Translation3, UnitQuaternion};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const PATTERN: PatternSpec = PatternSpec {
    columns: 9,
    rows: 6,
    square_size: 0.03,
};

fn primary_camera() -> PinholeCamera {
    PinholeCamera::new(
        CameraIntrinsics {
            fx: 1450.0,
            fy: 1446.0,
            cx: 958.0,
            cy: 722.0,
            skew: 0.0,
        },
        BrownConrady::from_array([-0.14, 0.05, 0.0006, -0.0004, 0.0]),
    )
}

fn secondary_camera() -> PinholeCamera {
    PinholeCamera::new(
        CameraIntrinsics {
            fx: 1438.0,
            fy: 1435.0,
            cx: 965.0,
            cy: 716.0,
            skew: 0.0,
        },
        BrownConrady::from_array([-0.12, 0.03, -0.0005, 0.0003, 0.0]),
    )
}

fn secondary_from_primary() -> Iso3 {
    Iso3::from_parts(
        Translation3::new(-0.12, 0.003, 0.006),
        UnitQuaternion::from_scaled_axis(Vec3::new(0.008, 0.07, -0.004)),
    )
}

fn board_points() -> Vec<Pt3> {
    let mut pts = Vec::new();
    for j in 0..PATTERN.rows {
        for i in 0..PATTERN.columns {
            pts.push(PATTERN.corner_position(i, j));
        }
    }
    pts
}

fn stereo_views(n: usize, noise_px: f64) -> Vec<StereoView> {
    let board = board_points();
    let center = Pt3::new(0.12, 0.075, 0.0);
    let rel = secondary_from_primary();
    let noise_p = UniformPixelNoise {
        seed: 11,
        max_abs_px: noise_px,
    };
    let noise_s = UniformPixelNoise {
        seed: 97,
        max_abs_px: noise_px,
    };
    board_poses(n, center, 0.8)
        .iter()
        .enumerate()
        .map(|(i, pose)| StereoView {
            primary: project_view(&primary_camera(), pose, &board, &noise_p, i).unwrap(),
            secondary: project_view(&secondary_camera(), &(rel * pose), &board, &noise_s, i)
                .unwrap(),
        })
        .collect()
}

fn stereo_input() -> CalibrationInput {
    CalibrationInput {
        image_width: 1920,
        image_height: 1440,
        mode: CalibrationMode::Stereo,
        pattern: PATTERN,
        min_samples: 5,
        max_rms_error: 1.0,
    }
}

/// A calibration built from the ground-truth rig, no estimation involved.
fn ground_truth_result() -> CalibrationResult {
    let p = primary_camera();
    let s = secondary_camera();
    let rel = secondary_from_primary();
    let rotation = rel.rotation.to_rotation_matrix().into_inner();
    let translation = rel.translation.vector;
    let essential = essential_matrix(&rotation, &translation);
    CalibrationResult {
        mode: CalibrationMode::Stereo,
        image_width: 1920,
        image_height: 1440,
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

#[test]
fn synthetic_stereo_calibration_recovers_rig() {
    let mut calib = Calibration::configure(stereo_input()).unwrap();
    for view in stereo_views(10, 0.2) {
        calib.add_stereo_sample(view).unwrap();
    }
    let result = calib.run_calibration().unwrap();

    let gt_p = primary_camera().intrinsics;
    let est_p = result.primary.intrinsics;
    assert!((est_p.fx - gt_p.fx).abs() < 5.0, "fx {}", est_p.fx);
    assert!((est_p.cx - gt_p.cx).abs() < 5.0, "cx {}", est_p.cx);

    let secondary = result.secondary.unwrap();
    assert!((secondary.intrinsics.fy - secondary_camera().intrinsics.fy).abs() < 5.0);

    let stereo = result.stereo.unwrap();
    let baseline = stereo.translation.norm();
    let gt_baseline = secondary_from_primary().translation.vector.norm();
    assert!((baseline - gt_baseline).abs() < 2e-3, "baseline {baseline}");
    assert!(stereo.rms_error < 0.5, "rms {}", stereo.rms_error);
    assert!(result.primary.rms_error < 0.5);
}

#[test]
fn saved_calibration_loads_back_identically() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stereo_calibration.json");
    let mut result = ground_truth_result();
    result.primary.rms_error = 0.1 + 0.2;

    result.save(&path).unwrap();
    let loaded = CalibrationResult::load(&path).unwrap();
    assert_eq!(loaded, result);
}

#[test]
fn malformed_calibration_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, r#"{"mode": "stereo", "image_width": "wide"}"#).unwrap();
    let err = CalibrationResult::load(&path).unwrap_err();
    assert!(matches!(err, CalibrationError::MalformedCalibrationFile { .. }));
    assert_eq!(err.category(), ErrorCategory::Configuration);
}

#[test]
fn stereo_file_without_geometry_is_malformed() {
    let dir = tempdir().unwrap();
    for strip_secondary in [false, true] {
        let path = dir.path().join("partial.json");
        let mut result = ground_truth_result();
        if strip_secondary {
            result.secondary = None;
        } else {
            result.stereo = None;
        }
        result.save(&path).unwrap();
        let err = CalibrationResult::load(&path).unwrap_err();
        assert!(
            matches!(err, CalibrationError::MalformedCalibrationFile { .. }),
            "{err}"
        );
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }
}

#[test]
fn rms_over_the_bound_does_not_converge() {
    let mut calib = Calibration::configure(CalibrationInput {
        max_rms_error: 0.05,
        ..stereo_input()
    })
    .unwrap();
    for view in stereo_views(8, 2.0) {
        calib.add_stereo_sample(view).unwrap();
    }
    let err = calib.run_calibration().unwrap_err();
    assert!(
        matches!(err, CalibrationError::CalibrationDidNotConverge(_)),
        "{err}"
    );
    assert_eq!(err.category(), ErrorCategory::Numerical);
}

#[test]
fn triangulation_recovers_known_point() {
    let result = ground_truth_result();
    let triangulator = StereoTriangulator::new(&result, TriangulationConfig::default()).unwrap();
    let rel = secondary_from_primary();

    let x = Pt3::new(0.05, -0.02, 0.9);
    let pair = PointPair::new(
        primary_camera().project(&x).unwrap(),
        secondary_camera().project(&rel.transform_point(&x)).unwrap(),
    );
    let point = triangulator.triangulate(&pair, Some(3), "fish").unwrap();
    assert!((point.position - x).norm() < 1e-6, "{:?}", point.position);
    assert!(point.reprojection_error < 1e-6);
    assert_eq!(point.frame, Some(3));
    assert_eq!(point.label, "fish");
}

#[test]
fn points_over_the_bound_are_dropped() {
    let result = ground_truth_result();
    let triangulator = StereoTriangulator::new(
        &result,
        TriangulationConfig {
            max_reprojection_error: 1.0,
        },
    )
    .unwrap();
    let rel = secondary_from_primary();
    let x = Pt3::new(0.0, 0.0, 1.0);
    let mut secondary_px = secondary_camera()
        .project(&rel.transform_point(&x))
        .unwrap();
    // Vertical offset cannot be explained by any point on the epipolar line.
    secondary_px.y += 25.0;
    let pair = PointPair::new(primary_camera().project(&x).unwrap(), secondary_px);
    assert!(triangulator.triangulate(&pair, None, "0").is_none());
}

#[test]
fn triangulate_points_from_files() {
    let dir = tempdir().unwrap();
    let calib_path = dir.path().join("calib.json");
    ground_truth_result().save(&calib_path).unwrap();

    let rel = secondary_from_primary();
    let xs = [Pt3::new(0.05, -0.02, 0.9), Pt3::new(-0.1, 0.08, 1.3)];
    let fmt = |p: fishtrack_core::Pt2| format!("[{}, {}]", p.x, p.y);
    let primary: Vec<String> = xs
        .iter()
        .map(|x| fmt(primary_camera().project(x).unwrap()))
        .collect();
    let secondary: Vec<String> = xs
        .iter()
        .map(|x| fmt(secondary_camera().project(&rel.transform_point(x)).unwrap()))
        .collect();

    let points_path = dir.path().join("points.json");
    fs::write(
        &points_path,
        format!(
            r#"{{"primary": [{}], "secondary": [{}]}}"#,
            primary.join(","),
            secondary.join(",")
        ),
    )
    .unwrap();
    let points = triangulate_points(&points_path, &calib_path, TriangulationConfig::default())
        .unwrap();
    assert_eq!(points.len(), 2);
    assert!((points[1].position - xs[1]).norm() < 1e-6);
    assert_eq!(points[1].label, "1");

    let mismatch_path = dir.path().join("mismatch.json");
    fs::write(
        &mismatch_path,
        format!(r#"{{"primary": [{}], "secondary": []}}"#, primary[0]),
    )
    .unwrap();
    let err = triangulate_points(&mismatch_path, &calib_path, TriangulationConfig::default())
        .unwrap_err();
    assert!(matches!(
        err,
        CalibrationError::CorrespondenceCountMismatch {
            primary: 1,
            secondary: 0
        }
    ));
    assert_eq!(err.category(), ErrorCategory::Invariant);
}

#[test]
fn mono_calibration_cannot_triangulate() {
    let mut result = ground_truth_result();
    result.mode = CalibrationMode::Mono;
    result.secondary = None;
    result.stereo = None;
    assert!(matches!(
        StereoTriangulator::new(&result, TriangulationConfig::default()),
        Err(CalibrationError::InvalidConfiguration(_))
    ));
}

fn write_sidecar(image: &Path, view: &fishtrack_core::CorrespondenceView) {
    let corners: Vec<String> = view
        .points_3d
        .iter()
        .zip(&view.points_2d)
        .map(|(pw, px)| {
            let i = (pw.x / PATTERN.square_size).round();
            let j = (pw.y / PATTERN.square_size).round();
            format!("[{i}, {j}, {}, {}]", px.x, px.y)
        })
        .collect();
    fs::write(image, b"").unwrap();
    fs::write(
        CornerFileDetector::sidecar_path(image),
        format!(r#"{{"corners": [{}]}}"#, corners.join(",")),
    )
    .unwrap();
}

#[test]
fn read_images_skips_missing_patterns_and_calibrates() {
    let dir = tempdir().unwrap();
    let left = dir.path().join("left");
    let right = dir.path().join("right");
    fs::create_dir_all(&left).unwrap();
    fs::create_dir_all(&right).unwrap();

    let views = stereo_views(8, 0.1);
    for (i, view) in views.iter().enumerate() {
        write_sidecar(&left.join(format!("img_{i:02}.png")), &view.primary);
        let right_img = right.join(format!("img_{i:02}.png"));
        if i == 3 {
            // Pattern not visible in this secondary image.
            fs::write(&right_img, b"").unwrap();
        } else {
            write_sidecar(&right_img, &view.secondary);
        }
    }

    let mut calib = Calibration::configure(stereo_input()).unwrap();
    let added = calib.read_images(&left, &right).unwrap();
    assert_eq!(added, 7);
    let result = calib.run_calibration().unwrap();
    assert!(result.stereo.is_some());

    let maps = RectificationMaps::build(&result, CameraSide::Secondary).unwrap();
    assert_eq!(maps.map_x.len(), 1920 * 1440);
    let centre = 720 * 1920 + 960;
    assert!(maps.map_x[centre].is_finite() && maps.map_y[centre].is_finite());
}

#[test]
fn read_images_rejects_unbalanced_sets() {
    let dir = tempdir().unwrap();
    let left = dir.path().join("left");
    let right = dir.path().join("right");
    fs::create_dir_all(&left).unwrap();
    fs::create_dir_all(&right).unwrap();
    fs::write(left.join("a.png"), b"").unwrap();
    fs::write(left.join("b.png"), b"").unwrap();
    fs::write(right.join("a.png"), b"").unwrap();

    let mut calib = Calibration::configure(stereo_input()).unwrap();
    assert!(matches!(
        calib.read_images(&left, &right),
        Err(CalibrationError::InvalidConfiguration(_))
    ));
}

#[test]
fn too_few_detections_is_insufficient_samples() {
    let dir = tempdir().unwrap();
    let left = dir.path().join("left");
    let right = dir.path().join("right");
    fs::create_dir_all(&left).unwrap();
    fs::create_dir_all(&right).unwrap();
    let views = stereo_views(2, 0.0);
    for (i, view) in views.iter().enumerate() {
        write_sidecar(&left.join(format!("{i}.png")), &view.primary);
        write_sidecar(&right.join(format!("{i}.png")), &view.secondary);
    }

    let mut calib = Calibration::configure(stereo_input()).unwrap();
    let err = calib.read_images(&left, &right).unwrap_err();
    assert!(matches!(
        err,
        CalibrationError::InsufficientSamples {
            found: 2,
            required: 5
        }
    ));
}

#[test]
fn mono_mode_rejects_stereo_samples() {
    let input = CalibrationInput {
        mode: CalibrationMode::Mono,
        ..stereo_input()
    };
    let mut calib = Calibration::configure(input).unwrap();
    let view = stereo_views(1, 0.0).remove(0);
    assert!(calib.add_stereo_sample(view.clone()).is_err());
    calib.add_sample(view.primary).unwrap();
    assert_eq!(calib.sample_count(), 1);
}
