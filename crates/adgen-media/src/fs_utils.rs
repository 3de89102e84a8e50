//! Filesystem helpers for render artifacts.

use std::path::Path;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// A plain rename is tried first. On EXDEV the file is copied to a
/// temporary sibling of `dst`, renamed into place, and the source removed.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename, copying instead: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// EXDEV is error code 18 on Linux/macOS.
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let tmp_dst = dst.with_extension("tmp");

    fs::copy(src, &tmp_dst).await?;

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(
            "Failed to remove source after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}

/// Delete a file, logging instead of failing. Returns whether it was removed.
pub fn remove_best_effort(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove file");
            false
        }
    }
}

/// Check that a stage produced a non-trivial output file.
///
/// Returns the file size in bytes.
pub async fn verify_output(path: &Path, min_bytes: u64) -> MediaResult<u64> {
    let meta = match fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MediaError::integrity(path, "output file missing"));
        }
        Err(e) => return Err(e.into()),
    };

    if !meta.is_file() {
        return Err(MediaError::integrity(path, "output is not a regular file"));
    }
    if meta.len() < min_bytes {
        return Err(MediaError::integrity(
            path,
            format!("output is {} bytes, expected at least {}", meta.len(), min_bytes),
        ));
    }

    Ok(meta.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_file_same_filesystem() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.mp4");
        let dst = dir.path().join("dest.mp4");

        fs::write(&src, b"test content").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "test content");
    }

    #[tokio::test]
    async fn test_move_file_to_subdirectory() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.mp4");
        let dst = dir.path().join("run").join("final.mp4");

        fs::write(&src, b"x").await.unwrap();
        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert!(dst.exists());
    }

    #[tokio::test]
    async fn test_move_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let result = move_file(dir.path().join("nope"), dir.path().join("dst")).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_remove_best_effort() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("asset.mp4");
        std::fs::write(&path, b"data").unwrap();

        assert!(remove_best_effort(&path));
        assert!(!path.exists());
        assert!(!remove_best_effort(&path));
    }

    #[tokio::test]
    async fn test_verify_output() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.mp4");

        let err = verify_output(&path, 1).await.unwrap_err();
        assert!(matches!(err, MediaError::FileIntegrity { .. }));

        fs::write(&path, b"").await.unwrap();
        assert!(verify_output(&path, 1).await.is_err());

        fs::write(&path, vec![0u8; 2048]).await.unwrap();
        assert_eq!(verify_output(&path, 1024).await.unwrap(), 2048);
    }
}
