use crate::error::{ProcessorError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Hands finished artifacts to remote storage.
pub trait ArtifactUploader: Send + Sync {
    fn upload(&self, local_path: &Path, folder_id: &str) -> Result<()>;
}

/// Copies artifacts into `<root>/<folder_id>/`, e.g. a synced share.
#[derive(Debug, Clone)]
pub struct DirectoryUploader {
    root: PathBuf,
}

impl DirectoryUploader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ArtifactUploader for DirectoryUploader {
    fn upload(&self, local_path: &Path, folder_id: &str) -> Result<()> {
        let failed = |message: String| ProcessorError::Upload {
            path: local_path.to_path_buf(),
            message,
        };
        let name = local_path
            .file_name()
            .ok_or_else(|| failed("artifact path has no file name".into()))?;
        let folder = self.root.join(folder_id);
        fs::create_dir_all(&folder).map_err(|e| failed(e.to_string()))?;
        fs::copy(local_path, folder.join(name)).map_err(|e| failed(e.to_string()))?;
        log::info!("uploaded {} to {}", local_path.display(), folder.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_into_folder() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("DE_x.json");
        fs::write(&src, "{}").unwrap();
        let uploader = DirectoryUploader::new(dir.path().join("remote"));
        uploader.upload(&src, "run-7").unwrap();
        assert!(dir.path().join("remote/run-7/DE_x.json").is_file());
        assert!(uploader.upload(&dir.path().join("gone.json"), "run-7").is_err());
    }
}
