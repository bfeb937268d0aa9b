use std::{fs, path::Path, path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fishtrack_calib::{
    io::write_json_atomic, Calibration, CalibrationInput, CalibrationMode, CalibrationResult,
};
use fishtrack_pipeline::{
    BatchConfig, BatchRunner, DirectoryUploader, Processor, ProcessorConfig,
};
use serde::{Deserialize, Serialize};

/// Stereo fish tracking: camera calibration, triangulation and video batches.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// JSON file with an `AppConfig`. Defaults are used if omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Calibrate from folders of calibration images.
    Calibrate {
        /// Image file or folder for the primary camera.
        #[arg(long)]
        primary: PathBuf,
        /// Image file or folder for the secondary camera (stereo mode).
        #[arg(long)]
        secondary: Option<PathBuf>,
        /// Where to write the calibration result.
        #[arg(long)]
        output: PathBuf,
        /// Detect chessboard corners in the pixels instead of reading
        /// `<image>.corners.json` files.
        #[cfg(feature = "chessboard")]
        #[arg(long)]
        chessboard: bool,
    },
    /// Triangulate a point-correspondence file with a saved calibration.
    Triangulate {
        #[arg(long)]
        points: PathBuf,
        #[arg(long)]
        calibration: PathBuf,
        /// Write the points here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Process every pair of unprocessed videos in a folder.
    Process {
        #[arg(long)]
        videos: PathBuf,
        /// Folder for `DE_<id>.json` artifacts.
        #[arg(long)]
        artifacts: PathBuf,
        /// Stereo calibration used to triangulate marker positions.
        #[arg(long)]
        calibration: Option<PathBuf>,
        /// Run the jobs of a batch on parallel threads.
        #[arg(long)]
        parallel: bool,
        /// Copy artifacts into `<upload-dir>/<upload_folder>` after each batch.
        #[arg(long)]
        upload_dir: Option<PathBuf>,
    },
}

/// Everything configurable from the `--config` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct AppConfig {
    calibration: CalibrationInput,
    processor: ProcessorConfig,
    batch: BatchConfig,
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => load_json_file(path),
        None => Ok(AppConfig::default()),
    }
}

#[cfg(feature = "chessboard")]
fn select_detector(calibration: Calibration, chessboard: bool) -> Result<Calibration> {
    Ok(if chessboard {
        calibration.with_detector(fishtrack_calib::ChessboardDetector::default())
    } else {
        calibration
    })
}

#[cfg(not(feature = "chessboard"))]
fn select_detector(calibration: Calibration, chessboard: bool) -> Result<Calibration> {
    if chessboard {
        bail!("built without the `chessboard` feature");
    }
    Ok(calibration)
}

fn run_calibrate(
    config: &AppConfig,
    primary: &Path,
    secondary: Option<&Path>,
    output: &Path,
    chessboard: bool,
) -> Result<CalibrationResult> {
    let calibration = Calibration::configure(config.calibration.clone())?;
    let mut calibration = select_detector(calibration, chessboard)?;

    let samples = match (config.calibration.mode, secondary) {
        (CalibrationMode::Stereo, Some(secondary)) => {
            calibration.read_images(primary, secondary)?
        }
        (CalibrationMode::Stereo, None) => bail!("stereo calibration needs --secondary"),
        (CalibrationMode::Mono, _) => calibration.read_images_mono(primary)?,
    };
    log::info!("calibrating from {samples} samples");

    let result = calibration.run_calibration()?;
    result
        .save(output)
        .with_context(|| format!("saving calibration to {}", output.display()))?;
    Ok(result)
}

fn run_triangulate(
    config: &AppConfig,
    points: &Path,
    calibration: &Path,
    output: Option<&Path>,
) -> Result<String> {
    let triangulated =
        Processor::triangulate_points(points, calibration, config.processor.triangulation)?;
    match output {
        Some(path) => {
            write_json_atomic(path, &triangulated)?;
            Ok(format!("{} points written to {}", triangulated.len(), path.display()))
        }
        None => Ok(serde_json::to_string_pretty(&triangulated)?),
    }
}

/// Run batches until one leaves nothing behind to pick up.
fn run_process(
    config: &AppConfig,
    videos: &Path,
    artifacts: &Path,
    calibration: Option<&Path>,
    upload_dir: Option<&Path>,
) -> Result<usize> {
    let mut runner = BatchRunner::new(config.batch.clone(), config.processor.clone(), artifacts);
    if let Some(path) = calibration {
        let result = CalibrationResult::load(path)
            .with_context(|| format!("loading calibration {}", path.display()))?;
        runner = runner.with_calibration(Arc::new(result));
    }
    if let Some(dir) = upload_dir {
        if config.batch.upload_folder.is_none() {
            log::warn!("--upload-dir given without batch.upload_folder; nothing will be uploaded");
        }
        runner = runner.with_uploader(Box::new(DirectoryUploader::new(dir)));
    }

    let mut succeeded = 0;
    for batch in 1.. {
        let report = runner.run_directory(videos)?;
        succeeded += report.succeeded();
        for job in report.jobs.iter().filter(|j| !j.succeeded()) {
            log::warn!(
                "batch {batch}: job {} failed: {}",
                job.id,
                job.error.as_deref().unwrap_or("unknown error")
            );
        }
        if report.jobs.is_empty() || report.removed.is_empty() {
            break;
        }
    }
    Ok(succeeded)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = try_main() {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Calibrate {
            primary,
            secondary,
            output,
            #[cfg(feature = "chessboard")]
            chessboard,
        } => {
            #[cfg(not(feature = "chessboard"))]
            let chessboard = false;
            let result =
                run_calibrate(&config, &primary, secondary.as_deref(), &output, chessboard)?;
            println!(
                "calibration written to {} (primary rms {:.3} px)",
                output.display(),
                result.primary.rms_error
            );
        }
        Command::Triangulate {
            points,
            calibration,
            output,
        } => {
            println!(
                "{}",
                run_triangulate(&config, &points, &calibration, output.as_deref())?
            );
        }
        Command::Process {
            videos,
            artifacts,
            calibration,
            parallel,
            upload_dir,
        } => {
            config.batch.parallel |= parallel;
            let succeeded = run_process(
                &config,
                &videos,
                &artifacts,
                calibration.as_deref(),
                upload_dir.as_deref(),
            )?;
            println!("{succeeded} job(s) succeeded");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partial_config_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.json");
        fs::write(
            &path,
            r#"{"batch": {"parallel": true}, "processor": {"miss_tolerance": 9}}"#,
        )
        .unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert!(config.batch.parallel);
        assert_eq!(config.processor.miss_tolerance, 9);
        assert_eq!(config.calibration, CalibrationInput::default());
        assert_eq!(load_config(None).unwrap(), AppConfig::default());
    }

    #[test]
    fn unreadable_config_names_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("bad.json"));
    }

    #[test]
    fn arguments_parse() {
        let cli = Cli::try_parse_from([
            "fishtrack",
            "--config",
            "app.json",
            "process",
            "--videos",
            "in",
            "--artifacts",
            "out",
            "--parallel",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some(Path::new("app.json")));
        assert!(matches!(cli.command, Command::Process { parallel: true, .. }));
        assert!(Cli::try_parse_from(["fishtrack", "triangulate", "--points", "p.json"]).is_err());
    }

    #[test]
    fn stereo_calibration_requires_secondary() {
        let dir = tempdir().unwrap();
        let err = run_calibrate(
            &AppConfig::default(),
            dir.path(),
            None,
            &dir.path().join("calib.json"),
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("--secondary"));
    }

    #[test]
    fn triangulate_reports_missing_calibration() {
        let dir = tempdir().unwrap();
        let points = dir.path().join("points.json");
        fs::write(&points, r#"{"primary": [], "secondary": []}"#).unwrap();
        assert!(run_triangulate(
            &AppConfig::default(),
            &points,
            &dir.path().join("missing.json"),
            None
        )
        .is_err());
    }

    #[test]
    fn process_on_empty_folder_runs_nothing() {
        let dir = tempdir().unwrap();
        let videos = dir.path().join("videos");
        fs::create_dir(&videos).unwrap();
        let succeeded = run_process(
            &AppConfig::default(),
            &videos,
            &dir.path().join("artifacts"),
            None,
            None,
        )
        .unwrap();
        assert_eq!(succeeded, 0);
    }
}
