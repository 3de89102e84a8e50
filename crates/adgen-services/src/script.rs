//! Ad script generation.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::error::{ServiceError, ServiceResult};
use crate::replicate::{output_text, ReplicateClient};

/// Token budget for a 30-50 word script.
pub const SCRIPT_MAX_TOKENS: u32 = 100;

/// Produces narration scripts from a user prompt.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> ServiceResult<String>;
}

/// Instruction sent to the language model for a user prompt.
pub fn ad_script_prompt(prompt: &str) -> String {
    format!(
        "Generate a 30-50 word video ad script for: {prompt}. Start with an attention-grabbing \
         hook to entice viewers to watch. Keep it concise, engaging, and suitable for a 15-30 \
         second ad. Use a warm, inviting tone and include a clear call-to-action. Split into \
         3-4 sentences."
    )
}

/// [`ScriptGenerator`] running a hosted language model.
pub struct ReplicateScriptGenerator {
    client: Arc<ReplicateClient>,
    model: String,
}

impl ReplicateScriptGenerator {
    pub fn new(client: Arc<ReplicateClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ScriptGenerator for ReplicateScriptGenerator {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> ServiceResult<String> {
        let input = json!({
            "prompt": ad_script_prompt(prompt),
            "max_tokens": max_tokens,
        });

        let output = self.client.run(&self.model, input).await?;
        let script = output_text(&output).trim().to_string();
        if script.is_empty() {
            return Err(ServiceError::empty("language model returned an empty script"));
        }

        info!(model = %self.model, words = script.split_whitespace().count(), "Script generated");
        Ok(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use reqwest::Client;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_prompt_embeds_request() {
        let text = ad_script_prompt("a bakery in Austin");
        assert!(text.contains("for: a bakery in Austin."));
        assert!(text.contains("call-to-action"));
    }

    async fn generator(server: &MockServer) -> ReplicateScriptGenerator {
        let config = ServiceConfig {
            replicate_api_token: Some("t".into()),
            replicate_base_url: server.uri(),
            ..Default::default()
        };
        let client = ReplicateClient::new(&config, Client::new()).unwrap();
        ReplicateScriptGenerator::new(Arc::new(client), "openai/gpt-4o")
    }

    #[tokio::test]
    async fn test_generate_joins_stream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"input": {"max_tokens": 100}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "status": "succeeded",
                "output": ["Craving ", "fresh bread? ", "Visit today!"]
            })))
            .mount(&server)
            .await;

        let script = generator(&server)
            .await
            .generate("bakery", SCRIPT_MAX_TOKENS)
            .await
            .unwrap();
        assert_eq!(script, "Craving fresh bread? Visit today!");
    }

    #[tokio::test]
    async fn test_empty_script_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "status": "succeeded",
                "output": ["  "]
            })))
            .mount(&server)
            .await;

        let err = generator(&server).await.generate("x", 100).await.unwrap_err();
        assert!(matches!(err, ServiceError::EmptyResult(_)));
    }
}
