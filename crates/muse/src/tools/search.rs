use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use super::payload::SearchResult;

pub const DEFAULT_TAVILY_HOST: &str = "https://api.tavily.com";

/// External web-search collaborator.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
}

pub struct TavilyClient {
    client: Client,
    host: String,
    api_key: String,
}

impl TavilyClient {
    pub fn new(host: String, api_key: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(TavilyClient {
            client,
            host,
            api_key,
        })
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("TAVILY_API_KEY")
            .map_err(|_| anyhow!("TAVILY_API_KEY environment variable is not set"))?;
        Self::new(DEFAULT_TAVILY_HOST.to_string(), api_key)
    }
}

#[async_trait]
impl SearchClient for TavilyClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let url = format!("{}/search", self.host.trim_end_matches('/'));
        let payload = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
            "search_depth": "basic",
        });

        let response = self.client.post(&url).json(&payload).send().await?;
        let data: Value = match response.status() {
            StatusCode::OK => response.json().await?,
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                return Err(anyhow!("Tavily server error: {}", status))
            }
            status => return Err(anyhow!("Tavily request failed: {}", status)),
        };

        let results = data
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("No results array in Tavily response"))?;

        Ok(results
            .iter()
            .map(|r| SearchResult {
                title: r
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or("Untitled")
                    .to_string(),
                content: r
                    .get("content")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                url: r
                    .get("url")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect())
    }
}
