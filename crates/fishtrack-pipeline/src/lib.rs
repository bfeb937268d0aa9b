//! Batch processing of synchronized stereo video pairs.
//!
//! A [`BatchRunner`] pairs the videos of a directory into jobs, runs a
//! [`Processor`] per pair (optionally in parallel), writes one
//! `DE_<id>.json` [`Artifact`] per succeeded job and then cleans up and
//! uploads.

mod artifact;
mod batch;
mod config;
mod correspondences;
mod error;
pub mod ffmpeg;
mod job;
mod pairing;
mod processor;
mod source;
mod upload;

pub use artifact::{artifact_path, processed_ids, processed_stems, Artifact};
pub use batch::{BatchReport, BatchRunner};
pub use config::{BatchConfig, ProcessorConfig};
pub use correspondences::{
    CorrespondenceFinder, LabeledPair, MarkerCorrespondences, SuppliedCorrespondences,
};
pub use error::{ProcessorError, Result, SourceError};
pub use ffmpeg::FfmpegSource;
pub use job::{JobStatus, VideoPairJob};
pub use pairing::{discover_videos, pair_videos};
pub use processor::{ProcessingReport, Processor};
pub use source::{DefaultOpener, FrameSource, ImageSequenceSource, MemorySource, SourceOpener};
pub use upload::{ArtifactUploader, DirectoryUploader};
