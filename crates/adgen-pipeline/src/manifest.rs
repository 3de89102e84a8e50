//! Manifest persistence.

use std::path::{Path, PathBuf};

use adgen_models::AssetManifest;
use tracing::debug;

use crate::error::PipelineResult;

pub const MANIFEST_FILE: &str = "manifest.json";

/// `<run_dir>/manifest.json`
pub fn manifest_path(run_dir: &Path) -> PathBuf {
    run_dir.join(MANIFEST_FILE)
}

/// Write `manifest` as pretty JSON. The file is written under a temporary
/// name first so readers never observe a partial manifest.
pub async fn write_manifest(run_dir: &Path, manifest: &AssetManifest) -> PipelineResult<PathBuf> {
    tokio::fs::create_dir_all(run_dir).await?;

    let path = manifest_path(run_dir);
    let tmp = run_dir.join(format!(".{MANIFEST_FILE}.tmp"));
    let json = serde_json::to_vec_pretty(manifest)?;

    tokio::fs::write(&tmp, &json).await?;
    tokio::fs::rename(&tmp, &path).await?;

    debug!(run_id = %manifest.run_id, path = %path.display(), bytes = json.len(), "Manifest written");
    Ok(path)
}

pub async fn read_manifest(path: &Path) -> PipelineResult<AssetManifest> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use adgen_models::{AssetBinding, Intermediates, RunId, Segment, SegmentTiming, VisualAsset};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let run_id = RunId::from_string("run-42");
        let run_dir = dir.path().join(run_id.as_str());

        let mut segment = Segment::untimed(0, "Fresh bread daily");
        segment.end_time = 3.5;
        let manifest = AssetManifest {
            run_id: run_id.clone(),
            created_at: chrono::Utc::now(),
            prompt: "a bakery".to_string(),
            script: "Fresh bread daily.".to_string(),
            segment_timings: vec![SegmentTiming::from(&segment)],
            segments: vec![segment],
            keywords: vec!["bread".to_string()],
            audio: PathBuf::from("/w/audio/narration.wav"),
            media: vec![AssetBinding {
                segment_index: Some(0),
                asset: VisualAsset::placeholder("assets/fallback.png"),
                fallback: true,
            }],
            final_ad: run_dir.join("final_ad.mp4"),
            audio_duration: 3.5,
            final_duration: Some(3.5),
            intermediates: Intermediates::default(),
        };

        let path = write_manifest(&run_dir, &manifest).await.unwrap();
        assert_eq!(path, run_dir.join("manifest.json"));
        assert!(!run_dir.join(".manifest.json.tmp").exists());

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["runId"], "run-42");
        assert_eq!(raw["media"][0]["fallback"], true);

        let loaded = read_manifest(&path).await.unwrap();
        assert_eq!(loaded, manifest);
    }
}
