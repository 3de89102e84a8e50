//! Narration synthesis.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use adgen_models::VoiceParams;

use crate::error::{ServiceError, ServiceResult};
use crate::replicate::{output_url, ReplicateClient};

/// Turns script text into encoded audio bytes.
#[async_trait]
pub trait NarrationSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &VoiceParams) -> ServiceResult<Vec<u8>>;
}

/// [`NarrationSynthesizer`] running a hosted text-to-speech model.
///
/// The model answers with a file URL which is fetched immediately.
pub struct ReplicateNarrator {
    client: Arc<ReplicateClient>,
    http: Client,
    model: String,
}

impl ReplicateNarrator {
    pub fn new(client: Arc<ReplicateClient>, http: Client, model: impl Into<String>) -> Self {
        Self {
            client,
            http,
            model: model.into(),
        }
    }
}

/// Model input: the voice parameters plus the text.
fn speech_input(text: &str, voice: &VoiceParams) -> ServiceResult<Value> {
    let mut input = serde_json::to_value(voice)?;
    if let Value::Object(map) = &mut input {
        map.insert("text".to_string(), Value::String(text.to_string()));
    }
    Ok(input)
}

#[async_trait]
impl NarrationSynthesizer for ReplicateNarrator {
    async fn synthesize(&self, text: &str, voice: &VoiceParams) -> ServiceResult<Vec<u8>> {
        let output = self.client.run(&self.model, speech_input(text, voice)?).await?;
        let url = output_url(&output)
            .ok_or_else(|| ServiceError::invalid_response("speech model returned no audio URL"))?;

        debug!(url = %url, "Fetching synthesized audio");
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_status(status, body));
        }

        let audio = response.bytes().await?.to_vec();
        if audio.is_empty() {
            return Err(ServiceError::empty("speech model returned zero audio bytes"));
        }

        info!(model = %self.model, bytes = audio.len(), "Narration synthesized");
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn narrator(server: &MockServer, audio: ResponseTemplate) -> ReplicateNarrator {
        Mock::given(method("POST"))
            .and(path("/v1/models/minimax/speech-02-hd/predictions"))
            .and(body_partial_json(json!({
                "input": {"text": "Hello.", "voice_id": "English_CalmWoman", "sample_rate": 32000}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "status": "succeeded",
                "output": format!("{}/files/audio.wav", server.uri())
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/audio.wav"))
            .respond_with(audio)
            .mount(server)
            .await;

        let config = ServiceConfig {
            replicate_api_token: Some("t".into()),
            replicate_base_url: server.uri(),
            ..Default::default()
        };
        let client = ReplicateClient::new(&config, Client::new()).unwrap();
        ReplicateNarrator::new(Arc::new(client), Client::new(), "minimax/speech-02-hd")
    }

    #[test]
    fn test_speech_input_has_text_and_voice() {
        let input = speech_input("Hi", &VoiceParams::default()).unwrap();
        assert_eq!(input["text"], "Hi");
        assert_eq!(input["channel"], "mono");
        assert_eq!(input["bitrate"], 128000);
    }

    #[tokio::test]
    async fn test_synthesize_downloads_audio() {
        let server = MockServer::start().await;
        let n = narrator(&server, ResponseTemplate::new(200).set_body_bytes(vec![1u8; 64])).await;
        let audio = n.synthesize("Hello.", &VoiceParams::default()).await.unwrap();
        assert_eq!(audio.len(), 64);
    }

    #[tokio::test]
    async fn test_audio_fetch_error_status() {
        let server = MockServer::start().await;
        let n = narrator(&server, ResponseTemplate::new(404)).await;
        let err = n.synthesize("Hello.", &VoiceParams::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::RequestFailed { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_zero_byte_audio_is_error() {
        let server = MockServer::start().await;
        let n = narrator(&server, ResponseTemplate::new(200)).await;
        let err = n.synthesize("Hello.", &VoiceParams::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::EmptyResult(_)));
    }
}
