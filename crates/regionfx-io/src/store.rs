//! Reading the source file and replacing it atomically.

use std::io::Write;
use std::path::Path;

use image::ImageFormat;
use regionfx_pipeline::PipelineError;
use tempfile::NamedTempFile;

/// Read the whole file at `path`.
///
/// # Errors
///
/// Returns [`PipelineError::ImageNotFound`] if the file cannot be read.
pub fn load(path: &Path) -> Result<Vec<u8>, PipelineError> {
    std::fs::read(path)
        .map_err(|e| PipelineError::ImageNotFound(format!("{}: {e}", path.display())))
}

/// Output format implied by the file extension, if any.
#[must_use]
pub fn format_hint(path: &Path) -> Option<ImageFormat> {
    ImageFormat::from_path(path).ok()
}

/// Replace the file at `path` with `bytes`.
///
/// The bytes are written to a temporary file in the same directory and
/// renamed over `path` only once fully flushed, so a failure at any point
/// leaves the original untouched.
///
/// # Errors
///
/// Returns [`PipelineError::StorageFailed`] if the temporary file cannot
/// be created, written or renamed.
pub fn store_atomic(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    let storage = |what: &str, e: std::io::Error| {
        PipelineError::StorageFailed(format!("{what} for {}: {e}", path.display()))
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| storage("create temporary file", e))?;
    tmp.write_all(bytes)
        .map_err(|e| storage("write temporary file", e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| storage("sync temporary file", e))?;

    // Keep the original's permissions on the replacement.
    if let Ok(meta) = std::fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(|e| storage("copy permissions", e))?;
    }

    tmp.persist(path).map_err(|e| storage("rename", e.error))?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_file_is_image_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = load(&dir.path().join("nope.png"));
        assert!(matches!(result, Err(PipelineError::ImageNotFound(_))));
    }

    #[test]
    fn store_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"old").unwrap();
        store_atomic(&path, b"new contents").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new contents");
    }

    #[test]
    fn store_leaves_no_temporaries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        store_atomic(&path, b"x").unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn store_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("a.bin");
        let result = store_atomic(&path, b"x");
        assert!(matches!(result, Err(PipelineError::StorageFailed(_))));
    }

    #[test]
    fn hint_from_extension() {
        assert_eq!(format_hint(Path::new("x.JPG")), Some(ImageFormat::Jpeg));
        assert_eq!(format_hint(Path::new("x.bmp")), Some(ImageFormat::Bmp));
        assert_eq!(format_hint(Path::new("noext")), None);
    }
}
