use crate::error::{ProcessorError, Result};
use fishtrack_calib::io::write_json_atomic;
use fishtrack_calib::TriangulatedPoint;
use fishtrack_events::EventInterval;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

const ARTIFACT_PREFIX: &str = "DE_";
const ARTIFACT_EXTENSION: &str = "json";

/// Everything one processed video pair produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub primary: PathBuf,
    pub secondary: PathBuf,
    pub frame_count: u64,
    pub events: Vec<EventInterval>,
    pub points: Vec<TriangulatedPoint>,
}

pub fn artifact_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{ARTIFACT_PREFIX}{id}.{ARTIFACT_EXTENSION}"))
}

impl Artifact {
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let path = artifact_path(dir, &self.id);
        write_json_atomic(&path, self)?;
        log::info!(
            "wrote {} ({} events, {} points)",
            path.display(),
            self.events.len(),
            self.points.len()
        );
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| ProcessorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| ProcessorError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })
    }
}

/// Ids of the artifacts already present in `dir`. A missing directory has none.
pub fn processed_ids(dir: &Path) -> Result<BTreeSet<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(source) => {
            return Err(ProcessorError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut ids = BTreeSet::new();
    for entry in entries {
        let path = entry
            .map_err(|source| ProcessorError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        if path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXTENSION) {
            continue;
        }
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_prefix(ARTIFACT_PREFIX));
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            ids.insert(id.to_string());
        }
    }
    Ok(ids)
}

/// Stems of every source video an artifact in `dir` was built from.
///
/// Both halves of each recorded pair are included, so a kept secondary can
/// never be paired with a newer video. An artifact that cannot be read still
/// contributes its id, the primary stem.
pub fn processed_stems(dir: &Path) -> Result<BTreeSet<String>> {
    let mut stems = BTreeSet::new();
    for id in processed_ids(dir)? {
        match Artifact::load(&artifact_path(dir, &id)) {
            Ok(artifact) => {
                for source in [&artifact.primary, &artifact.secondary] {
                    if let Some(stem) = source.file_stem().and_then(|s| s.to_str()) {
                        stems.insert(stem.to_string());
                    }
                }
            }
            Err(e) => log::warn!("{e}; excluding only {id}"),
        }
        stems.insert(id);
    }
    Ok(stems)
}
