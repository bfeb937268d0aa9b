//! File helpers: image listing and atomic JSON writes.

use crate::error::{CalibrationError, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// A single image file, or the images of a directory in lexicographic order.
pub fn list_images(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let entries = fs::read_dir(path).map_err(|e| CalibrationError::io(path, e))?;
    let mut images = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CalibrationError::io(path, e))?;
        let p = entry.path();
        if p.is_file() && is_image_path(&p) {
            images.push(p);
        }
    }
    images.sort();
    Ok(images)
}

/// Serialize `value` as pretty JSON next to `path` and rename it into place.
///
/// Readers never observe a partially written file.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value).map_err(|e| {
        CalibrationError::io(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| CalibrationError::io(parent, e))?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let write = || -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&json)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    };
    write().map_err(|e| {
        let _ = fs::remove_file(&tmp);
        CalibrationError::io(path, e)
    })?;

    log::debug!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lists_images_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        for name in ["b.png", "a.JPG", "notes.txt", "c.tiff"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let names: Vec<String> = list_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.JPG", "b.png", "c.tiff"]);
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("nested").join("out.json.tmp").exists());
        let back: Vec<i32> = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(back, [1, 2, 3]);
    }

    #[test]
    fn missing_directory_is_io_error() {
        let err = list_images(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, CalibrationError::Io { .. }));
    }
}
