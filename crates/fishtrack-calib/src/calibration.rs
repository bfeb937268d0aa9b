use crate::config::{CalibrationInput, CalibrationMode};
use crate::detect::{CornerFileDetector, PatternDetector};
use crate::error::{CalibrationError, Result};
use crate::io::list_images;
use crate::result::CalibrationResult;
use crate::solve::{calibrate_camera, calibrate_stereo};
use fishtrack_core::{CorrespondenceView, StereoView};
use std::path::Path;

/// Collects pattern observations and solves for a [`CalibrationResult`].
///
/// ```no_run
/// # use fishtrack_calib::{Calibration, CalibrationInput};
/// # use std::path::Path;
/// let mut calib = Calibration::configure(CalibrationInput::default())?;
/// calib.read_images(Path::new("calib/left"), Path::new("calib/right"))?;
/// let result = calib.run_calibration()?;
/// result.save(Path::new("stereo_calibration.json"))?;
/// # Ok::<(), fishtrack_calib::CalibrationError>(())
/// ```
pub struct Calibration {
    input: CalibrationInput,
    detector: Box<dyn PatternDetector>,
    mono_samples: Vec<CorrespondenceView>,
    stereo_samples: Vec<StereoView>,
}

impl std::fmt::Debug for Calibration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Calibration")
            .field("input", &self.input)
            .field("mono_samples", &self.mono_samples.len())
            .field("stereo_samples", &self.stereo_samples.len())
            .finish_non_exhaustive()
    }
}

impl Calibration {
    pub fn configure(input: CalibrationInput) -> Result<Self> {
        input.validate()?;
        Ok(Self {
            input,
            detector: Box::new(CornerFileDetector),
            mono_samples: Vec::new(),
            stereo_samples: Vec::new(),
        })
    }

    pub fn with_detector(mut self, detector: impl PatternDetector + 'static) -> Self {
        self.detector = Box::new(detector);
        self
    }

    pub fn input(&self) -> &CalibrationInput {
        &self.input
    }

    pub fn sample_count(&self) -> usize {
        match self.input.mode {
            CalibrationMode::Mono => self.mono_samples.len(),
            CalibrationMode::Stereo => self.stereo_samples.len(),
        }
    }

    fn require_mode(&self, mode: CalibrationMode) -> Result<()> {
        if self.input.mode != mode {
            return Err(CalibrationError::InvalidConfiguration(format!(
                "operation needs {mode:?} mode, calibration is configured for {:?}",
                self.input.mode
            )));
        }
        Ok(())
    }

    fn validate_view(&self, view: &CorrespondenceView) -> Result<()> {
        if view.len() < 4 {
            return Err(CalibrationError::InvalidConfiguration(format!(
                "a sample needs at least 4 points, got {}",
                view.len()
            )));
        }
        Ok(())
    }

    pub fn add_sample(&mut self, view: CorrespondenceView) -> Result<()> {
        self.require_mode(CalibrationMode::Mono)?;
        self.validate_view(&view)?;
        self.mono_samples.push(view);
        Ok(())
    }

    pub fn add_stereo_sample(&mut self, view: StereoView) -> Result<()> {
        self.require_mode(CalibrationMode::Stereo)?;
        self.validate_view(&view.primary)?;
        self.validate_view(&view.secondary)?;
        self.stereo_samples.push(view);
        Ok(())
    }

    /// Run the detector on one image; a miss is logged and reported as `None`.
    fn detect(&self, path: &Path) -> Result<Option<CorrespondenceView>> {
        match self.detector.detect(path, &self.input.pattern)? {
            Some(view) => Ok(Some(view)),
            None => {
                let miss = CalibrationError::PatternNotFound {
                    path: path.to_path_buf(),
                };
                log::warn!("{miss}, skipping");
                Ok(None)
            }
        }
    }

    fn ensure_enough_samples(&self) -> Result<()> {
        let found = self.sample_count();
        if found < self.input.min_samples {
            return Err(CalibrationError::InsufficientSamples {
                found,
                required: self.input.min_samples,
            });
        }
        Ok(())
    }

    /// Detect the pattern in co-captured image sets. Images pair up by sorted position.
    pub fn read_images(&mut self, primary: &Path, secondary: &Path) -> Result<usize> {
        self.require_mode(CalibrationMode::Stereo)?;
        let primary_images = list_images(primary)?;
        let secondary_images = list_images(secondary)?;
        if primary_images.len() != secondary_images.len() {
            return Err(CalibrationError::InvalidConfiguration(format!(
                "image counts differ: {} in {} vs {} in {}",
                primary_images.len(),
                primary.display(),
                secondary_images.len(),
                secondary.display()
            )));
        }

        let mut added = 0;
        for (p, s) in primary_images.iter().zip(&secondary_images) {
            let (Some(pv), Some(sv)) = (self.detect(p)?, self.detect(s)?) else {
                continue;
            };
            log::debug!("pattern found in {} and {}", p.display(), s.display());
            self.stereo_samples.push(StereoView {
                primary: pv,
                secondary: sv,
            });
            added += 1;
        }
        log::info!(
            "{added} of {} image pairs usable for calibration",
            primary_images.len()
        );

        self.ensure_enough_samples()?;
        Ok(added)
    }

    pub fn read_images_mono(&mut self, source: &Path) -> Result<usize> {
        self.require_mode(CalibrationMode::Mono)?;
        let images = list_images(source)?;
        let mut added = 0;
        for path in &images {
            if let Some(view) = self.detect(path)? {
                self.mono_samples.push(view);
                added += 1;
            }
        }
        log::info!("{added} of {} images usable for calibration", images.len());

        self.ensure_enough_samples()?;
        Ok(added)
    }

    pub fn run_calibration(&self) -> Result<CalibrationResult> {
        self.ensure_enough_samples()?;
        let input = &self.input;
        match input.mode {
            CalibrationMode::Mono => {
                let solution = calibrate_camera("mono", &self.mono_samples, input)?;
                Ok(CalibrationResult {
                    mode: CalibrationMode::Mono,
                    image_width: input.image_width,
                    image_height: input.image_height,
                    primary: solution.calibration,
                    secondary: None,
                    stereo: None,
                })
            }
            CalibrationMode::Stereo => {
                let solution = calibrate_stereo(&self.stereo_samples, input)?;
                Ok(CalibrationResult {
                    mode: CalibrationMode::Stereo,
                    image_width: input.image_width,
                    image_height: input.image_height,
                    primary: solution.primary,
                    secondary: Some(solution.secondary),
                    stereo: Some(solution.geometry),
                })
            }
        }
    }
}
