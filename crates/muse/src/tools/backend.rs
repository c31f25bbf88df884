use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

/// Collaborator for project-aware tools (knowledge base, file access,
/// semantic code search). These run against a local companion server rather
/// than in-process.
#[async_trait]
pub trait ProjectBackend: Send + Sync {
    async fn execute(&self, tool: &str, params: &Value) -> Result<String>;
}

pub const DEFAULT_BACKEND_ENDPOINT: &str = "http://localhost:3001/api/tools/execute";

pub struct HttpProjectBackend {
    client: Client,
    endpoint: String,
}

impl HttpProjectBackend {
    pub fn new(endpoint: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(HttpProjectBackend { client, endpoint })
    }
}

#[async_trait]
impl ProjectBackend for HttpProjectBackend {
    async fn execute(&self, tool: &str, params: &Value) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "tool": tool, "params": params }))
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(anyhow!("Backend returned {}", response.status()));
        }

        let data: Value = response.json().await?;
        match data.get("result") {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.to_string()),
            None => Err(anyhow!("No result field in backend response")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_execute_returns_result_field() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/tools/execute"))
            .and(body_partial_json(json!({"tool": "list_dir"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"result": "src\nCargo.toml"})),
            )
            .mount(&mock_server)
            .await;

        let backend = HttpProjectBackend::new(format!("{}/api/tools/execute", mock_server.uri()))?;
        let result = backend.execute("list_dir", &json!({"path": "."})).await?;
        assert_eq!(result, "src\nCargo.toml");
        Ok(())
    }

    #[tokio::test]
    async fn test_non_200_is_an_error() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let backend = HttpProjectBackend::new(format!("{}/api/tools/execute", mock_server.uri()))?;
        assert!(backend.execute("read_file", &json!({})).await.is_err());
        Ok(())
    }
}
