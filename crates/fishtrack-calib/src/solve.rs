//! Calibration solvers: linear initialisation followed by LM refinement.

use crate::config::CalibrationInput;
use crate::error::{CalibrationError, Result};
use crate::result::{CameraCalibration, StereoGeometry};
use fishtrack_core::{
    BrownConrady, CameraIntrinsics, CorrespondenceView, Iso3, PinholeCamera, Real, StereoView,
};
use fishtrack_linear::{
    dlt_homography, essential_matrix, fundamental_matrix, intrinsics_from_homographies,
    pose_from_homography, relative_pose_from_board_poses, stereo_rectify,
};
use fishtrack_optim::{
    refine_mono, refine_stereo, LmBackend, SolveOptions, SolveReport, StereoEstimate,
};

fn not_converged(msg: impl Into<String>) -> CalibrationError {
    CalibrationError::CalibrationDidNotConverge(msg.into())
}

fn check_solve(what: &str, report: &SolveReport, rms: Real, input: &CalibrationInput) -> Result<()> {
    if !report.converged {
        return Err(not_converged(format!(
            "{what}: solver stopped with {}",
            report.termination
        )));
    }
    if !rms.is_finite() || rms > input.max_rms_error {
        return Err(not_converged(format!(
            "{what}: rms {rms:.4} px exceeds bound {:.4} px",
            input.max_rms_error
        )));
    }
    Ok(())
}

/// Zhang initialisation of intrinsics and board poses for one camera.
pub(crate) fn initial_camera(
    views: &[CorrespondenceView],
    input: &CalibrationInput,
) -> Result<(PinholeCamera, Vec<Iso3>)> {
    let homographies = views
        .iter()
        .enumerate()
        .map(|(idx, view)| {
            dlt_homography(&view.planar_points(), &view.points_2d)
                .map_err(|e| not_converged(format!("homography of view {idx}: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let intrinsics = match intrinsics_from_homographies(&homographies) {
        Ok(mut k) => {
            k.skew = 0.0;
            k
        }
        Err(e) => {
            // Near-fronto-parallel views leave the conic ill-conditioned; start
            // from a centred principal point and let refinement recover.
            log::warn!("closed-form intrinsics failed ({e}), using a generic initial guess");
            let f = Real::from(input.image_width.max(input.image_height));
            CameraIntrinsics {
                fx: f,
                fy: f,
                cx: 0.5 * Real::from(input.image_width),
                cy: 0.5 * Real::from(input.image_height),
                skew: 0.0,
            }
        }
    };
    log::debug!(
        "initial intrinsics fx={:.2} fy={:.2} cx={:.2} cy={:.2}",
        intrinsics.fx,
        intrinsics.fy,
        intrinsics.cx,
        intrinsics.cy
    );

    let k = intrinsics.k_matrix();
    let poses = homographies
        .iter()
        .map(|h| pose_from_homography(&k, h).map_err(|e| not_converged(e.to_string())))
        .collect::<Result<Vec<_>>>()?;

    Ok((PinholeCamera::new(intrinsics, BrownConrady::default()), poses))
}

pub(crate) struct CameraSolution {
    pub calibration: CameraCalibration,
    pub poses: Vec<Iso3>,
}

pub(crate) fn calibrate_camera(
    label: &str,
    views: &[CorrespondenceView],
    input: &CalibrationInput,
) -> Result<CameraSolution> {
    let (camera, poses) = initial_camera(views, input)?;
    let refined = refine_mono(&LmBackend, views, &camera, &poses, &SolveOptions::default())
        .map_err(|e| not_converged(format!("{label}: {e:#}")))?;
    check_solve(label, &refined.report, refined.rms, input)?;
    log::info!("{label} camera calibrated, rms {:.4} px", refined.rms);

    Ok(CameraSolution {
        calibration: CameraCalibration {
            intrinsics: refined.camera.intrinsics,
            distortion: refined.camera.distortion,
            rms_error: refined.rms,
        },
        poses: refined.poses,
    })
}

pub(crate) struct StereoSolution {
    pub primary: CameraCalibration,
    pub secondary: CameraCalibration,
    pub geometry: StereoGeometry,
}

pub(crate) fn calibrate_stereo(views: &[StereoView], input: &CalibrationInput) -> Result<StereoSolution> {
    let primary_views: Vec<CorrespondenceView> = views.iter().map(|v| v.primary.clone()).collect();
    let secondary_views: Vec<CorrespondenceView> =
        views.iter().map(|v| v.secondary.clone()).collect();

    let primary = calibrate_camera("primary", &primary_views, input)?;
    let secondary = calibrate_camera("secondary", &secondary_views, input)?;

    let relative = relative_pose_from_board_poses(&primary.poses, &secondary.poses)
        .map_err(|e| not_converged(format!("relative pose: {e:#}")))?;

    let initial = StereoEstimate {
        primary: primary.calibration.camera(),
        secondary: secondary.calibration.camera(),
        secondary_from_primary: relative,
        board_poses: primary.poses,
    };
    let refined = refine_stereo(&LmBackend, views, &initial, &SolveOptions::default())
        .map_err(|e| not_converged(format!("stereo: {e:#}")))?;
    check_solve("stereo", &refined.report, refined.stereo_rms, input)?;

    let est = refined.estimate;
    let rotation = est.secondary_from_primary.rotation.to_rotation_matrix().into_inner();
    let translation = est.secondary_from_primary.translation.vector;
    let essential = essential_matrix(&rotation, &translation);
    let fundamental = fundamental_matrix(
        &est.primary.intrinsics.k_matrix(),
        &est.secondary.intrinsics.k_matrix(),
        &essential,
    )
    .map_err(|e| not_converged(format!("fundamental matrix: {e:#}")))?;
    let rectification = stereo_rectify(
        &est.primary.intrinsics,
        &est.secondary.intrinsics,
        &rotation,
        &translation,
    )
    .map_err(|e| not_converged(format!("rectification: {e:#}")))?;

    log::info!(
        "stereo pair calibrated, rms {:.4} px, baseline {:.4}",
        refined.stereo_rms,
        translation.norm()
    );

    Ok(StereoSolution {
        primary: CameraCalibration {
            intrinsics: est.primary.intrinsics,
            distortion: est.primary.distortion,
            rms_error: refined.primary_rms,
        },
        secondary: CameraCalibration {
            intrinsics: est.secondary.intrinsics,
            distortion: est.secondary.distortion,
            rms_error: refined.secondary_rms,
        },
        geometry: StereoGeometry {
            rotation,
            translation,
            essential,
            fundamental,
            rms_error: refined.stereo_rms,
            rectification,
        },
    })
}
