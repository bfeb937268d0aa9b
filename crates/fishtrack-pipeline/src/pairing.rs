//! Discovering input videos and pairing them into jobs.

use crate::error::{ProcessorError, Result};
use crate::job::VideoPairJob;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

fn stem(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str())
}

/// Files in `dir` with one of `extensions` (case-insensitive), sorted.
pub fn discover_videos(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let io_err = |source| ProcessorError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut videos = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)));
        if path.is_file() && matches {
            videos.push(path);
        }
    }
    videos.sort();
    Ok(videos)
}

/// Pair consecutive unprocessed videos: `(v0, v1), (v2, v3), ...`.
///
/// Videos whose stem is in `processed` are excluded first. Callers pass the
/// stems of both sources of every earlier pair (see
/// [`processed_stems`](crate::processed_stems)), so the remaining videos keep
/// their session order. An odd trailing video is returned separately and
/// waits for a later batch.
pub fn pair_videos(
    mut videos: Vec<PathBuf>,
    processed: &BTreeSet<String>,
) -> (Vec<VideoPairJob>, Option<PathBuf>) {
    videos.sort();
    videos.retain(|v| match stem(v) {
        Some(s) if processed.contains(s) => {
            log::debug!("{} already processed", v.display());
            false
        }
        _ => true,
    });

    let mut chunks = videos.chunks_exact(2);
    let jobs: Vec<VideoPairJob> = chunks
        .by_ref()
        .map(|pair| VideoPairJob::new(pair[0].clone(), pair[1].clone()))
        .collect();
    let leftover = chunks.remainder().first().cloned();
    if let Some(v) = &leftover {
        log::info!("{} has no partner yet, leaving it for a later batch", v.display());
    }
    (jobs, leftover)
}
