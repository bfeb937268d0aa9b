use fishtrack_calib::TriangulationConfig;
use fishtrack_events::MotionConfig;
use serde::{Deserialize, Serialize};

/// Per-job processing options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Process the shorter stream instead of failing on unequal frame counts.
    pub allow_frame_count_mismatch: bool,
    /// Consecutive frames without a decode before a marker event closes.
    pub miss_tolerance: u32,
    /// Run a motion pre-pass to find activity segments.
    pub motion: Option<MotionConfig>,
    pub triangulation: TriangulationConfig,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            allow_frame_count_mismatch: false,
            miss_tolerance: 5,
            motion: None,
            triangulation: TriangulationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// One thread per job instead of running jobs on the caller's thread.
    pub parallel: bool,
    /// Video file extensions picked up from the input directory.
    pub extensions: Vec<String>,
    /// Delete both sources of a succeeded job once the batch has joined.
    pub remove_sources: bool,
    /// Folder handed to the uploader with every artifact.
    pub upload_folder: Option<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            extensions: ["mp4", "avi", "mov", "mkv"].map(String::from).to_vec(),
            remove_sources: true,
            upload_folder: None,
        }
    }
}
