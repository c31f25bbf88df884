use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{CompletionRequest, Provider};
use super::configs::AnthropicProviderConfig;
use crate::models::Role;

pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;
        Ok(AnthropicProvider { client, config })
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut messages: Vec<Value> = request
            .history
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                json!({ "role": role, "content": turn.content })
            })
            .collect();
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let payload = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": request.system,
            "messages": messages,
            "temperature": request.temperature,
        });

        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let data: Value = match response.status() {
            StatusCode::OK => response.json().await?,
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                return Err(anyhow!("Anthropic server error: {}", status))
            }
            status => return Err(anyhow!("Anthropic request failed: {}", status)),
        };

        data["content"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("No text content in Anthropic response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_complete_basic() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test_key"))
            .and(header("anthropic-version", ANTHROPIC_API_VERSION))
            .and(body_partial_json(json!({
                "model": "claude-3-5-sonnet-20240620",
                "max_tokens": 1024,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{ "type": "text", "text": "Hello from Claude." }]
            })))
            .mount(&mock_server)
            .await;

        let mut config = AnthropicProviderConfig::new("test_key".to_string());
        config.host = mock_server.uri();
        let provider = AnthropicProvider::new(config)?;

        let text = provider
            .complete(&CompletionRequest::prompt_only("Be brief.", "Hello?", 0.7))
            .await?;
        assert_eq!(text, "Hello from Claude.");
        Ok(())
    }
}
