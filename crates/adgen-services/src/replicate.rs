//! Minimal client for Replicate-style prediction APIs.
//!
//! A prediction is created with `Prefer: wait`; if it has not finished
//! when the response arrives, its `urls.get` endpoint is polled until it
//! reaches a terminal status or the generation timeout elapses.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    id: String,
    status: String,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: Option<String>,
}

/// Client for creating and awaiting predictions.
#[derive(Debug, Clone)]
pub struct ReplicateClient {
    http: Client,
    base_url: String,
    token: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl ReplicateClient {
    /// Build from config; fails when no API token is configured.
    pub fn new(config: &ServiceConfig, http: Client) -> ServiceResult<Self> {
        let token = config
            .replicate_api_token
            .clone()
            .ok_or_else(|| ServiceError::not_configured("REPLICATE_API_TOKEN not set"))?;

        Ok(Self {
            http,
            base_url: config.replicate_base_url.trim_end_matches('/').to_string(),
            token,
            timeout: config.generation_timeout,
            poll_interval: config.poll_interval,
        })
    }

    /// Run `model` with `input` and return its `output` value.
    pub async fn run(&self, model: &str, input: Value) -> ServiceResult<Value> {
        match tokio::time::timeout(self.timeout, self.run_to_completion(model, input)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(model, timeout_secs = self.timeout.as_secs(), "Prediction timed out");
                Err(ServiceError::Timeout(self.timeout.as_secs()))
            }
        }
    }

    async fn run_to_completion(&self, model: &str, input: Value) -> ServiceResult<Value> {
        let url = format!("{}/v1/models/{}/predictions", self.base_url, model);
        debug!(model, "Creating prediction");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .header("Prefer", "wait")
            .json(&json!({ "input": input }))
            .send()
            .await?;

        let mut prediction = parse_prediction(response).await?;

        loop {
            match prediction.status.as_str() {
                "succeeded" => return Ok(prediction.output),
                "failed" | "canceled" => {
                    let reason = prediction
                        .error
                        .map(|e| match e {
                            Value::String(s) => s,
                            other => other.to_string(),
                        })
                        .unwrap_or_else(|| prediction.status.clone());
                    return Err(ServiceError::PredictionFailed(reason));
                }
                _ => {}
            }

            let poll_url = prediction
                .urls
                .and_then(|u| u.get)
                .ok_or_else(|| ServiceError::invalid_response("pending prediction has no poll URL"))?;

            debug!(prediction_id = %prediction.id, status = %prediction.status, "Polling prediction");
            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .http
                .get(&poll_url)
                .bearer_auth(&self.token)
                .send()
                .await?;
            prediction = parse_prediction(response).await?;
        }
    }
}

async fn parse_prediction(response: reqwest::Response) -> ServiceResult<Prediction> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ServiceError::from_status(status, body));
    }
    Ok(response.json().await?)
}

/// Text of a language-model output: streamed token arrays are concatenated.
pub fn output_text(output: &Value) -> String {
    match output {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => String::new(),
    }
}

/// File URL of a media-model output.
pub fn output_url(output: &Value) -> Option<String> {
    match output {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(Value::as_str).map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> ServiceConfig {
        ServiceConfig {
            replicate_api_token: Some("token".to_string()),
            replicate_base_url: base_url.to_string(),
            poll_interval: Duration::from_millis(10),
            generation_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    #[test]
    fn test_output_text_concatenates_tokens() {
        assert_eq!(output_text(&json!(["Fresh ", "bread", "."])), "Fresh bread.");
        assert_eq!(output_text(&json!("whole")), "whole");
        assert_eq!(output_text(&Value::Null), "");
    }

    #[test]
    fn test_output_url() {
        assert_eq!(output_url(&json!("https://x/a.wav")).as_deref(), Some("https://x/a.wav"));
        assert_eq!(output_url(&json!(["https://x/b.wav"])).as_deref(), Some("https://x/b.wav"));
        assert!(output_url(&json!({})).is_none());
    }

    #[test]
    fn test_requires_token() {
        let result = ReplicateClient::new(&ServiceConfig::default(), Client::new());
        assert!(matches!(result, Err(ServiceError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_run_succeeded_immediately() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/models/openai/gpt-4o/predictions"))
            .and(header("authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "p1",
                "status": "succeeded",
                "output": ["Hello", " world"]
            })))
            .mount(&server)
            .await;

        let client = ReplicateClient::new(&config(&server.uri()), Client::new()).unwrap();
        let output = client.run("openai/gpt-4o", json!({"prompt": "x"})).await.unwrap();
        assert_eq!(output_text(&output), "Hello world");
    }

    #[tokio::test]
    async fn test_run_polls_until_done() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/models/minimax/speech-02-hd/predictions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "p2",
                "status": "processing",
                "urls": {"get": format!("{}/v1/predictions/p2", server.uri())}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/predictions/p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "p2",
                "status": "succeeded",
                "output": "https://cdn.example/audio.wav"
            })))
            .mount(&server)
            .await;

        let client = ReplicateClient::new(&config(&server.uri()), Client::new()).unwrap();
        let output = client.run("minimax/speech-02-hd", json!({})).await.unwrap();
        assert_eq!(output_url(&output).unwrap(), "https://cdn.example/audio.wav");
    }

    #[tokio::test]
    async fn test_failed_prediction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "p3",
                "status": "failed",
                "error": "model crashed"
            })))
            .mount(&server)
            .await;

        let client = ReplicateClient::new(&config(&server.uri()), Client::new()).unwrap();
        let err = client.run("openai/gpt-4o", json!({})).await.unwrap_err();
        assert!(matches!(err, ServiceError::PredictionFailed(ref m) if m == "model crashed"));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let client = ReplicateClient::new(&config(&server.uri()), Client::new()).unwrap();
        let err = client.run("openai/gpt-4o", json!({})).await.unwrap_err();
        assert!(matches!(err, ServiceError::RequestFailed { status: 401, .. }));
    }
}
