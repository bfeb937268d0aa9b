//! Running a batch of video pair jobs.

use crate::artifact::{processed_stems, Artifact};
use crate::config::{BatchConfig, ProcessorConfig};
use crate::error::{ProcessorError, Result};
use crate::job::{JobStatus, VideoPairJob};
use crate::pairing::{discover_videos, pair_videos};
use crate::processor::Processor;
use crate::source::{DefaultOpener, SourceOpener};
use crate::upload::ArtifactUploader;
use fishtrack_calib::CalibrationResult;
use fishtrack_events::{MarkerDecoder, QrDecoder};
use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

/// Outcome of one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub jobs: Vec<VideoPairJob>,
    /// Video left without a partner.
    pub unpaired: Option<PathBuf>,
    /// Source paths deleted after the batch.
    pub removed: Vec<PathBuf>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.jobs.iter().filter(|j| j.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| j.status == JobStatus::Failed)
            .count()
    }
}

pub struct BatchRunner {
    config: BatchConfig,
    processor_config: ProcessorConfig,
    artifact_dir: PathBuf,
    opener: Arc<dyn SourceOpener>,
    decoder: Arc<dyn MarkerDecoder>,
    calibration: Option<Arc<CalibrationResult>>,
    uploader: Option<Box<dyn ArtifactUploader>>,
}

impl BatchRunner {
    pub fn new(
        config: BatchConfig,
        processor_config: ProcessorConfig,
        artifact_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            processor_config,
            artifact_dir: artifact_dir.into(),
            opener: Arc::new(DefaultOpener),
            decoder: Arc::new(QrDecoder),
            calibration: None,
            uploader: None,
        }
    }

    pub fn with_opener(mut self, opener: Arc<dyn SourceOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn MarkerDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_calibration(mut self, calibration: Arc<CalibrationResult>) -> Self {
        self.calibration = Some(calibration);
        self
    }

    pub fn with_uploader(mut self, uploader: Box<dyn ArtifactUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Pair the unprocessed videos of `dir` and run them as one batch.
    pub fn run_directory(&self, dir: &Path) -> Result<BatchReport> {
        let videos = discover_videos(dir, &self.config.extensions)?;
        let processed = processed_stems(&self.artifact_dir)?;
        let (jobs, unpaired) = pair_videos(videos, &processed);
        let mut report = self.run(jobs);
        report.unpaired = unpaired;
        Ok(report)
    }

    pub fn run(&self, mut jobs: Vec<VideoPairJob>) -> BatchReport {
        if jobs.is_empty() {
            return BatchReport::default();
        }
        log::info!(
            "running {} job(s) {}",
            jobs.len(),
            if self.config.parallel { "in parallel" } else { "sequentially" }
        );

        let outcomes: Vec<Result<Artifact>> = if self.config.parallel {
            thread::scope(|s| {
                let handles: Vec<_> = jobs
                    .iter()
                    .map(|job| s.spawn(move || self.run_job(job)))
                    .collect();
                handles
                    .into_iter()
                    .map(|h| h.join().unwrap_or_else(|payload| Err(panicked(payload))))
                    .collect()
            })
        } else {
            jobs.iter()
                .map(|job| {
                    panic::catch_unwind(AssertUnwindSafe(|| self.run_job(job)))
                        .unwrap_or_else(|payload| Err(panicked(payload)))
                })
                .collect()
        };

        let removed = self.after_batch(&mut jobs, outcomes);
        let report = BatchReport {
            jobs,
            unpaired: None,
            removed,
        };
        log::info!(
            "batch finished: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        );
        report
    }

    fn run_job(&self, job: &VideoPairJob) -> Result<Artifact> {
        log::info!(
            "job {}: {} + {}",
            job.id,
            job.primary.display(),
            job.secondary.display()
        );
        let mut processor = Processor::construct(
            &job.primary,
            &job.secondary,
            self.opener.as_ref(),
            self.processor_config.clone(),
        )?
        .with_decoder(Arc::clone(&self.decoder));
        if let Some(calibration) = &self.calibration {
            processor = processor.with_calibration(calibration)?;
        }

        let report = processor.process_videos()?;
        Ok(Artifact {
            id: job.id.clone(),
            primary: job.primary.clone(),
            secondary: job.secondary.clone(),
            frame_count: report.frames_processed,
            events: report.events,
            points: report.points,
        })
    }

    /// Record job outcomes once every worker has joined: save artifacts, then
    /// upload them and delete the sources of jobs whose artifact was written.
    fn after_batch(
        &self,
        jobs: &mut [VideoPairJob],
        outcomes: Vec<Result<Artifact>>,
    ) -> Vec<PathBuf> {
        for (job, outcome) in jobs.iter_mut().zip(outcomes) {
            let saved = outcome.and_then(|artifact| {
                let path = artifact.save(&self.artifact_dir)?;
                Ok((path, artifact))
            });
            match saved {
                Ok((path, artifact)) => {
                    job.status = JobStatus::Succeeded;
                    job.artifact = Some(path);
                    job.frames_processed = artifact.frame_count;
                    job.events = artifact.events;
                    job.points = artifact.points;
                }
                Err(e) => {
                    log::error!("job {} failed ({:?}): {e}", job.id, e.category());
                    job.status = JobStatus::Failed;
                    job.error = Some(e.to_string());
                }
            }
        }

        let mut removed = Vec::new();
        for job in jobs.iter().filter(|j| j.succeeded()) {
            if let (Some(uploader), Some(folder), Some(artifact)) = (
                &self.uploader,
                &self.config.upload_folder,
                &job.artifact,
            ) {
                if let Err(e) = uploader.upload(artifact, folder) {
                    log::warn!("job {}: {e}", job.id);
                }
            }

            if !self.config.remove_sources {
                continue;
            }
            for source in [&job.primary, &job.secondary] {
                match remove_source(source) {
                    Ok(()) => removed.push(source.clone()),
                    Err(e) => log::warn!("could not remove {}: {e}", source.display()),
                }
            }
        }
        removed
    }
}

fn remove_source(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> ProcessorError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    ProcessorError::Panicked(message)
}
