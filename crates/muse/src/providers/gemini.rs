use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use super::base::CompletionRequest;
use super::configs::GeminiProviderConfig;
use crate::memory::Embedder;
use crate::models::Role;

pub const EMBEDDING_MODEL: &str = "text-embedding-004";

/// Client for the primary provider. One client serves every (credential,
/// model) grid cell; the orchestrator chooses which cell to call.
pub struct GeminiClient {
    client: Client,
    config: GeminiProviderConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiProviderConfig) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;
        Ok(GeminiClient { client, config })
    }

    pub fn from_env() -> Result<Self> {
        GeminiClient::new(GeminiProviderConfig::from_env()?)
    }

    pub fn config(&self) -> &GeminiProviderConfig {
        &self.config
    }

    /// One completion attempt against a single grid cell.
    pub async fn generate(
        &self,
        api_key: &str,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.host.trim_end_matches('/'),
            model,
            api_key
        );

        let mut contents: Vec<Value> = request
            .history
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                json!({ "role": role, "parts": [{ "text": turn.content }] })
            })
            .collect();
        contents.push(json!({ "role": "user", "parts": [{ "text": request.prompt }] }));

        let payload = json!({
            "contents": contents,
            "system_instruction": { "parts": [{ "text": request.system }] },
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": self.config.max_output_tokens,
            },
        });

        let data = self.post(&url, payload).await?;
        data["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("No text candidate in Gemini response"))
    }

    async fn post(&self, url: &str, payload: Value) -> Result<Value> {
        let response = self.client.post(url).json(&payload).send().await?;
        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Gemini server error: {}", status))
            }
            status => Err(anyhow!("Gemini request failed: {}", status)),
        }
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let api_key = self
            .config
            .api_keys
            .first()
            .ok_or_else(|| anyhow!("No Gemini API key configured"))?;
        let url = format!(
            "{}/v1/models/{}:embedContent?key={}",
            self.config.host.trim_end_matches('/'),
            EMBEDDING_MODEL,
            api_key
        );

        let payload = json!({
            "model": format!("models/{}", EMBEDDING_MODEL),
            "content": { "parts": [{ "text": text }] },
        });

        let data = self.post(&url, payload).await?;
        let values = data["embedding"]["values"]
            .as_array()
            .ok_or_else(|| anyhow!("No embedding values in response"))?;
        Ok(values
            .iter()
            .filter_map(Value::as_f64)
            .map(|v| v as f32)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::base::Turn;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(host: String) -> GeminiProviderConfig {
        GeminiProviderConfig::new(host, vec!["test_key".to_string()])
    }

    #[tokio::test]
    async fn test_generate_maps_history_roles() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(query_param("key", "test_key"))
            .and(body_partial_json(json!({
                "contents": [
                    { "role": "user", "parts": [{ "text": "hi" }] },
                    { "role": "model", "parts": [{ "text": "hello" }] },
                    { "role": "user", "parts": [{ "text": "what now?" }] },
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "Next steps..." }] } }]
            })))
            .mount(&mock_server)
            .await;

        let client = GeminiClient::new(test_config(mock_server.uri()))?;
        let request = CompletionRequest::new(
            "You are helpful.",
            vec![Turn::user("hi"), Turn::assistant("hello")],
            "what now?",
            0.7,
        );
        let text = client
            .generate("test_key", "gemini-2.5-flash", &request)
            .await?;
        assert_eq!(text, "Next steps...");
        Ok(())
    }

    #[tokio::test]
    async fn test_rate_limit_is_an_error() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let client = GeminiClient::new(test_config(mock_server.uri()))?;
        let request = CompletionRequest::prompt_only("sys", "hi", 0.7);
        let result = client
            .generate("test_key", "gemini-2.5-flash", &request)
            .await;
        assert!(result.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_embed_parses_vector() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/models/{}:embedContent", EMBEDDING_MODEL)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embedding": { "values": [0.1, 0.2, 0.3] }
            })))
            .mount(&mock_server)
            .await;

        let client = GeminiClient::new(test_config(mock_server.uri()))?;
        let embedding = client.embed("remember this").await?;
        assert_eq!(embedding.len(), 3);
        Ok(())
    }
}
