//! Joint refinement of a stereo pair.
//!
//! Parameters: primary camera, secondary camera, `T_secondary_primary`, and
//! one board pose per view expressed in the primary camera frame. The
//! secondary camera sees each board through `T_secondary_primary * T_primary_board`.

use crate::params::{read_camera, read_pose, write_camera, write_pose, CAMERA_DIM, POSE_DIM};
use crate::residual::{scatter_jacobian, view_residuals, CHAINED_DIM, DIRECT_DIM};
use crate::{rms_from_residuals, NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
use anyhow::{ensure, Result};
use fishtrack_core::{Iso3, PinholeCamera, Real, StereoView};
use nalgebra::{DMatrix, DVector};

const PRIMARY: usize = 0;
const SECONDARY: usize = CAMERA_DIM;
const RELATIVE: usize = 2 * CAMERA_DIM;
const POSES: usize = 2 * CAMERA_DIM + POSE_DIM;

fn board_offset(view_idx: usize) -> usize {
    POSES + POSE_DIM * view_idx
}

#[derive(Debug, Clone)]
pub struct StereoProblem {
    views: Vec<StereoView>,
    n_residuals: usize,
}

/// Current estimate of every block in a [`StereoProblem`].
#[derive(Debug, Clone)]
pub struct StereoEstimate {
    pub primary: PinholeCamera,
    pub secondary: PinholeCamera,
    pub secondary_from_primary: Iso3,
    /// `T_primary_board` per view.
    pub board_poses: Vec<Iso3>,
}

impl StereoProblem {
    pub fn new(views: Vec<StereoView>) -> Result<Self> {
        ensure!(!views.is_empty(), "need at least one stereo view");
        for (idx, view) in views.iter().enumerate() {
            ensure!(
                view.primary.len() >= 4 && view.secondary.len() >= 4,
                "stereo view {idx} has too few points"
            );
        }
        let n_residuals = views
            .iter()
            .map(|v| 2 * (v.primary.len() + v.secondary.len()))
            .sum();
        Ok(Self { views, n_residuals })
    }

    pub fn pack(&self, estimate: &StereoEstimate) -> Result<DVector<Real>> {
        ensure!(
            estimate.board_poses.len() == self.views.len(),
            "expected {} board poses, got {}",
            self.views.len(),
            estimate.board_poses.len()
        );
        let mut x = DVector::zeros(self.num_params());
        write_camera(&mut x, PRIMARY, &estimate.primary);
        write_camera(&mut x, SECONDARY, &estimate.secondary);
        write_pose(&mut x, RELATIVE, &estimate.secondary_from_primary);
        for (i, pose) in estimate.board_poses.iter().enumerate() {
            write_pose(&mut x, board_offset(i), pose);
        }
        Ok(x)
    }

    pub fn unpack(&self, x: &DVector<Real>) -> StereoEstimate {
        StereoEstimate {
            primary: read_camera(x, PRIMARY),
            secondary: read_camera(x, SECONDARY),
            secondary_from_primary: read_pose(x, RELATIVE),
            board_poses: (0..self.views.len())
                .map(|i| read_pose(x, board_offset(i)))
                .collect(),
        }
    }

    /// Primary and secondary residuals of view `i`.
    fn view_pair_residuals(&self, x: &DVector<Real>, i: usize) -> (DVector<Real>, DVector<Real>) {
        let s = x.as_slice();
        let view = &self.views[i];
        let board = &s[board_offset(i)..board_offset(i) + POSE_DIM];
        let relative = &s[RELATIVE..RELATIVE + POSE_DIM];
        (
            view_residuals(&s[PRIMARY..PRIMARY + CAMERA_DIM], &[board], &view.primary),
            view_residuals(&s[SECONDARY..SECONDARY + CAMERA_DIM], &[board, relative], &view.secondary),
        )
    }

    /// RMS over the primary residuals, the secondary residuals, and both.
    pub fn split_rms(&self, x: &DVector<Real>) -> (Real, Real, Real) {
        let mut primary = Vec::new();
        let mut secondary = Vec::new();
        for i in 0..self.views.len() {
            let (rp, rs) = self.view_pair_residuals(x, i);
            primary.extend(rp.iter().copied());
            secondary.extend(rs.iter().copied());
        }
        let rp = DVector::from_vec(primary);
        let rs = DVector::from_vec(secondary);
        let all = DVector::from_iterator(rp.len() + rs.len(), rp.iter().chain(rs.iter()).copied());
        (
            rms_from_residuals(&rp),
            rms_from_residuals(&rs),
            rms_from_residuals(&all),
        )
    }
}

impl NllsProblem for StereoProblem {
    fn num_params(&self) -> usize {
        POSES + POSE_DIM * self.views.len()
    }

    fn num_residuals(&self) -> usize {
        self.n_residuals
    }

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        let mut r = Vec::with_capacity(self.n_residuals);
        for i in 0..self.views.len() {
            let (rp, rs) = self.view_pair_residuals(x, i);
            r.extend(rp.iter().chain(rs.iter()).copied());
        }
        DVector::from_vec(r)
    }

    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real> {
        let mut j = DMatrix::zeros(self.n_residuals, x.len());
        let mut row = 0;
        for (i, view) in self.views.iter().enumerate() {
            let board = (board_offset(i), POSE_DIM);
            row += scatter_jacobian::<DIRECT_DIM, _>(
                &mut j,
                row,
                x,
                &[(PRIMARY, CAMERA_DIM), board],
                |p| view_residuals(&p[..CAMERA_DIM], &[&p[CAMERA_DIM..]], &view.primary),
            );
            row += scatter_jacobian::<CHAINED_DIM, _>(
                &mut j,
                row,
                x,
                &[(SECONDARY, CAMERA_DIM), board, (RELATIVE, POSE_DIM)],
                |p| {
                    let (camera, poses) = p.split_at(CAMERA_DIM);
                    let (board_pose, relative) = poses.split_at(POSE_DIM);
                    view_residuals(camera, &[board_pose, relative], &view.secondary)
                },
            );
        }
        j
    }
}

#[derive(Debug, Clone)]
pub struct StereoRefinement {
    pub estimate: StereoEstimate,
    pub primary_rms: Real,
    pub secondary_rms: Real,
    pub stereo_rms: Real,
    pub report: SolveReport,
}

pub fn refine_stereo<B: NllsSolverBackend>(
    backend: &B,
    views: &[StereoView],
    initial: &StereoEstimate,
    opts: &SolveOptions,
) -> Result<StereoRefinement> {
    let problem = StereoProblem::new(views.to_vec())?;
    let x0 = problem.pack(initial)?;
    let (x, report) = backend.solve(&problem, x0, opts);
    let (primary_rms, secondary_rms, stereo_rms) = problem.split_rms(&x);
    log::debug!(
        "stereo refinement rms {stereo_rms:.4} px (primary {primary_rms:.4}, secondary {secondary_rms:.4}, {})",
        report.termination
    );
    Ok(StereoRefinement {
        estimate: problem.unpack(&x),
        primary_rms,
        secondary_rms,
        stereo_rms,
        report,
    })
}
