//! Scoped ownership of downloaded source assets.

use std::collections::BTreeSet;
use std::path::PathBuf;

use adgen_models::VisualAsset;
use tracing::debug;

use crate::fs_utils::remove_best_effort;

/// Owns the local files of downloaded assets for the lifetime of a run.
///
/// [`AssetLease::release`] deletes them (best-effort). Dropping an
/// unreleased lease releases it as well. The shared placeholder is never
/// leased.
#[derive(Debug, Default)]
pub struct AssetLease {
    paths: Vec<PathBuf>,
    released: bool,
}

impl AssetLease {
    pub fn new<'a>(assets: impl IntoIterator<Item = &'a VisualAsset>) -> Self {
        let mut seen = BTreeSet::new();
        let paths = assets
            .into_iter()
            .filter(|asset| !asset.is_placeholder())
            .map(|asset| asset.source_path.clone())
            .filter(|path| seen.insert(path.clone()))
            .collect();

        Self {
            paths,
            released: false,
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Delete every leased file. Idempotent; returns how many were removed.
    pub fn release(&mut self) -> usize {
        if self.released {
            return 0;
        }
        self.released = true;

        let removed = self.paths.iter().filter(|p| remove_best_effort(p)).count();
        debug!(leased = self.paths.len(), removed, "Released source assets");
        removed
    }
}

impl Drop for AssetLease {
    fn drop(&mut self) {
        if !self.released {
            self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adgen_models::AssetKind;
    use tempfile::TempDir;

    fn downloaded(dir: &TempDir, name: &str) -> VisualAsset {
        let path = dir.path().join(name);
        std::fs::write(&path, b"media").unwrap();
        VisualAsset::new(path, AssetKind::Video, "c", "pexels")
    }

    #[test]
    fn test_release_deletes_files_but_not_placeholder() {
        let dir = TempDir::new().unwrap();
        let placeholder_path = dir.path().join("fallback.png");
        std::fs::write(&placeholder_path, b"png").unwrap();

        let a = downloaded(&dir, "a.mp4");
        let placeholder = VisualAsset::placeholder(&placeholder_path);

        let mut lease = AssetLease::new([&a, &placeholder, &a]);
        assert_eq!(lease.len(), 1);
        assert_eq!(lease.release(), 1);
        assert!(!a.source_path.exists());
        assert!(placeholder_path.exists());

        // Second release is a no-op
        assert_eq!(lease.release(), 0);
    }

    #[test]
    fn test_drop_releases() {
        let dir = TempDir::new().unwrap();
        let a = downloaded(&dir, "a.mp4");
        {
            let _lease = AssetLease::new([&a]);
        }
        assert!(!a.source_path.exists());
    }
}
