//! Ad generation handler.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use adgen_models::AssetManifest;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    /// Local path of the rendered ad
    pub video_location: PathBuf,
    pub metadata: AssetManifest,
}

/// `POST /video/generate`
///
/// Runs the whole pipeline on its own task and answers once the ad is
/// rendered. A missing, blank or unparsable body is a `MISSING_PROMPT` error.
pub async fn generate_video(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<Json<GenerateResponse>> {
    let prompt = match body {
        Ok(Json(GenerateRequest { prompt: Some(p) })) if !p.trim().is_empty() => p,
        Ok(_) => return Err(ApiError::bad_request("prompt is required")),
        Err(rejection) => {
            return Err(ApiError::bad_request(format!(
                "prompt is required: {}",
                rejection.body_text()
            )))
        }
    };

    // Detached, so a dropped request never cancels a run midway
    let pipeline = Arc::clone(&state.pipeline);
    let manifest = tokio::spawn(async move { pipeline.run(&prompt).await })
        .await
        .map_err(|e| ApiError::internal(format!("generation task failed: {e}")))??;
    info!(
        run_id = %manifest.run_id,
        final_ad = %manifest.final_ad.display(),
        "Ad generated"
    );

    Ok(Json(GenerateResponse {
        video_location: manifest.final_ad.clone(),
        metadata: manifest,
    }))
}
