use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{CompletionRequest, Provider};
use super::configs::OpenAiCompatibleConfig;
use crate::models::Role;

/// Adapter for any chat-completions endpoint that speaks the OpenAI wire
/// shape. Groq and DeepSeek both qualify; see the preset constructors on
/// [`OpenAiCompatibleConfig`].
pub struct OpenAiCompatibleProvider {
    client: Client,
    config: OpenAiCompatibleConfig,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: OpenAiCompatibleConfig) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;
        Ok(OpenAiCompatibleProvider { client, config })
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => Err(anyhow!("Request failed: {}", status)),
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut messages: Vec<Value> = Vec::new();
        if let Some(system) = &self.config.system_prompt {
            messages.push(json!({ "role": "system", "content": system }));
        }
        for turn in &request.history {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(json!({ "role": role, "content": turn.content }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": request.temperature,
        });
        if let Some(tokens) = self.config.max_tokens {
            payload
                .as_object_mut()
                .expect("payload is an object")
                .insert("max_tokens".to_string(), json!(tokens));
        }

        let data = self.post(payload).await?;
        data["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("No message content in response"))
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
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test_key"))
            .and(body_partial_json(json!({
                "model": "llama-3.3-70b-versatile",
                "messages": [
                    { "role": "system", "content": "You are a helpful AI assistant." },
                    { "role": "user", "content": "Hello?" },
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": { "role": "assistant", "content": "Hi there." }
                }]
            })))
            .mount(&mock_server)
            .await;

        let mut config = OpenAiCompatibleConfig::groq("test_key".to_string());
        config.host = mock_server.uri();
        let provider = OpenAiCompatibleProvider::new(config)?;

        let request = CompletionRequest::prompt_only("ignored by preset", "Hello?", 0.7);
        let text = provider.complete(&request).await?;
        assert_eq!(text, "Hi there.");
        assert_eq!(provider.name(), "groq");
        Ok(())
    }

    #[tokio::test]
    async fn test_openai_preset_sends_no_system_message() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "messages": [{ "role": "user", "content": "ping" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "pong" } }]
            })))
            .mount(&mock_server)
            .await;

        let mut config = OpenAiCompatibleConfig::openai("k".to_string());
        config.host = mock_server.uri();
        let provider = OpenAiCompatibleProvider::new(config)?;

        let text = provider
            .complete(&CompletionRequest::prompt_only("sys", "ping", 0.5))
            .await?;
        assert_eq!(text, "pong");
        Ok(())
    }

    #[tokio::test]
    async fn test_server_error_is_err() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let mut config = OpenAiCompatibleConfig::deepseek("k".to_string());
        config.host = mock_server.uri();
        let provider = OpenAiCompatibleProvider::new(config)?;

        let result = provider
            .complete(&CompletionRequest::prompt_only("sys", "x", 0.7))
            .await;
        assert!(result.is_err());
        Ok(())
    }
}
