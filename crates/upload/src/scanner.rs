//! File scanning for upload.
//!
//! Recursively walks a directory and produces [`FileInfo`] entries whose
//! logical names are relative paths normalized to forward slashes.

use std::path::Path;

use crate::error::UploadError;
use crate::types::FileInfo;

/// Scans `root` and returns one entry per regular file, sorted by name.
///
/// A root that is itself a file yields a single entry named after it.
pub fn scan_files(root: &Path) -> Result<Vec<FileInfo>, UploadError> {
    let metadata = std::fs::metadata(root).map_err(|e| {
        UploadError::InvalidInput(format!("upload path {}: {e}", root.display()))
    })?;
    let root = root.canonicalize()?;

    let mut files = Vec::new();
    if metadata.is_file() {
        let logical_name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        files.push(FileInfo {
            absolute_path: root.clone(),
            logical_name,
            size_bytes: metadata.len(),
        });
    } else {
        walk_dir(&root, &root, &mut files)?;
        files.sort_by(|a, b| a.logical_name.cmp(&b.logical_name));
    }

    Ok(files)
}

fn walk_dir(root: &Path, current: &Path, files: &mut Vec<FileInfo>) -> Result<(), UploadError> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let path = entry.path();
        // Symlinks are neither files nor directories here and are skipped.
        let metadata = entry.metadata()?;

        if metadata.is_dir() {
            walk_dir(root, &path, files)?;
        } else if metadata.is_file() {
            let rel_path = path.strip_prefix(root).map_err(std::io::Error::other)?;

            // Normalize to forward slashes.
            let logical_name = rel_path.to_string_lossy().replace('\\', "/");

            files.push(FileInfo {
                absolute_path: path.clone(),
                logical_name,
                size_bytes: metadata.len(),
            });
        }
    }

    Ok(())
}

/// Total payload size of a file set.
pub fn total_size(files: &[FileInfo]) -> u64 {
    files.iter().map(|f| f.size_bytes).sum()
}
