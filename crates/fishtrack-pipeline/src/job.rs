use fishtrack_calib::TriangulatedPoint;
use fishtrack_events::EventInterval;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
}

/// One primary/secondary video pair to process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoPairJob {
    /// Primary file stem; names the artifact.
    pub id: String,
    pub primary: PathBuf,
    pub secondary: PathBuf,
    pub status: JobStatus,
    /// Frames run through the lock-step loop of both streams.
    #[serde(default)]
    pub frames_processed: u64,
    #[serde(default)]
    pub events: Vec<EventInterval>,
    #[serde(default)]
    pub points: Vec<TriangulatedPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VideoPairJob {
    pub fn new(primary: PathBuf, secondary: PathBuf) -> Self {
        let id = job_id(&primary);
        Self {
            id,
            primary,
            secondary,
            status: JobStatus::Pending,
            frames_processed: 0,
            events: Vec::new(),
            points: Vec::new(),
            artifact: None,
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == JobStatus::Succeeded
    }
}

fn job_id(primary: &Path) -> String {
    primary
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| primary.display().to_string())
}
