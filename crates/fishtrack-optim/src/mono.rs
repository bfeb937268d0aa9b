//! Single-camera refinement of intrinsics, distortion and per-view board poses.

use crate::params::{read_camera, read_pose, write_camera, write_pose, CAMERA_DIM, POSE_DIM};
use crate::residual::{scatter_jacobian, view_residuals, DIRECT_DIM};
use crate::{rms_from_residuals, NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
use anyhow::{ensure, Result};
use fishtrack_core::{CorrespondenceView, Iso3, PinholeCamera, Real};
use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone)]
pub struct MonoProblem {
    views: Vec<CorrespondenceView>,
    n_residuals: usize,
}

impl MonoProblem {
    pub fn new(views: Vec<CorrespondenceView>) -> Result<Self> {
        ensure!(!views.is_empty(), "need at least one view");
        for (idx, view) in views.iter().enumerate() {
            ensure!(view.len() >= 4, "view {idx} has {} points, need >= 4", view.len());
        }
        let n_residuals = views.iter().map(|v| 2 * v.len()).sum();
        Ok(Self { views, n_residuals })
    }

    pub fn pack(&self, camera: &PinholeCamera, poses: &[Iso3]) -> Result<DVector<Real>> {
        ensure!(
            poses.len() == self.views.len(),
            "expected {} poses, got {}",
            self.views.len(),
            poses.len()
        );
        let mut x = DVector::zeros(self.num_params());
        write_camera(&mut x, 0, camera);
        for (i, pose) in poses.iter().enumerate() {
            write_pose(&mut x, Self::pose_offset(i), pose);
        }
        Ok(x)
    }

    fn pose_offset(view_idx: usize) -> usize {
        CAMERA_DIM + POSE_DIM * view_idx
    }

    pub fn unpack(&self, x: &DVector<Real>) -> (PinholeCamera, Vec<Iso3>) {
        let camera = read_camera(x, 0);
        let poses = (0..self.views.len())
            .map(|i| read_pose(x, Self::pose_offset(i)))
            .collect();
        (camera, poses)
    }
}

impl NllsProblem for MonoProblem {
    fn num_params(&self) -> usize {
        CAMERA_DIM + POSE_DIM * self.views.len()
    }

    fn num_residuals(&self) -> usize {
        self.n_residuals
    }

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        let s = x.as_slice();
        let mut r = DVector::zeros(self.n_residuals);
        let mut row = 0;
        for (i, view) in self.views.iter().enumerate() {
            let pose = Self::pose_offset(i);
            let rv = view_residuals(&s[..CAMERA_DIM], &[&s[pose..pose + POSE_DIM]], view);
            r.rows_mut(row, rv.len()).copy_from(&rv);
            row += rv.len();
        }
        r
    }

    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real> {
        let mut j = DMatrix::zeros(self.n_residuals, x.len());
        let mut row = 0;
        for (i, view) in self.views.iter().enumerate() {
            row += scatter_jacobian::<DIRECT_DIM, _>(
                &mut j,
                row,
                x,
                &[(0, CAMERA_DIM), (Self::pose_offset(i), POSE_DIM)],
                |p| view_residuals(&p[..CAMERA_DIM], &[&p[CAMERA_DIM..]], view),
            );
        }
        j
    }
}

#[derive(Debug, Clone)]
pub struct MonoRefinement {
    pub camera: PinholeCamera,
    pub poses: Vec<Iso3>,
    /// RMS reprojection error in pixels.
    pub rms: Real,
    pub report: SolveReport,
}

/// Refine a camera and its board poses by minimising reprojection error.
pub fn refine_mono<B: NllsSolverBackend>(
    backend: &B,
    views: &[CorrespondenceView],
    camera: &PinholeCamera,
    poses: &[Iso3],
    opts: &SolveOptions,
) -> Result<MonoRefinement> {
    let problem = MonoProblem::new(views.to_vec())?;
    let x0 = problem.pack(camera, poses)?;
    let (x, report) = backend.solve(&problem, x0, opts);
    let rms = rms_from_residuals(&problem.residuals(&x));
    let (camera, poses) = problem.unpack(&x);
    log::debug!("mono refinement rms {rms:.4} px ({})", report.termination);
    Ok(MonoRefinement {
        camera,
        poses,
        rms,
        report,
    })
}
