//! Best-effort retrieval-augmented memory.
//!
//! Writes are fire-and-forget; reads are awaited but swallow every failure
//! into an empty result. A slow or dead memory backend degrades latency,
//! never correctness, and nothing here is ever user-visible on failure.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use crate::models::Role;

pub const DEFAULT_RECALL_K: usize = 5;
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.7;
/// Content shorter than this is not worth remembering.
pub const MIN_MEMORY_LENGTH: usize = 5;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embedder that produces nothing, for deployments without an embedding
/// backend. Remember becomes a no-op and recall stays empty.
pub struct NoopEmbedder;

#[async_trait]
impl Embedder for NoopEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub content: String,
    pub role: Role,
    pub embedding: Vec<f32>,
    pub owner: String,
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn store(&self, record: MemoryRecord) -> Result<()>;

    /// Returns the contents of up to `k` records above the similarity
    /// threshold, best match first.
    async fn search(&self, embedding: &[f32], threshold: f32, k: usize) -> Result<Vec<String>>;
}

pub struct MemoryService {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn MemoryStore>,
    owner: String,
    pub recall_k: usize,
    pub threshold: f32,
}

impl MemoryService {
    pub fn new<S: Into<String>>(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn MemoryStore>,
        owner: S,
    ) -> Self {
        MemoryService {
            embedder,
            store,
            owner: owner.into(),
            recall_k: DEFAULT_RECALL_K,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    /// Embed and store in the background. Failures are logged and dropped;
    /// the critical path never waits on this.
    pub fn remember(&self, content: &str, role: Role) {
        if content.trim().len() < MIN_MEMORY_LENGTH {
            return;
        }
        let embedder = self.embedder.clone();
        let store = self.store.clone();
        let owner = self.owner.clone();
        let content = content.to_string();

        tokio::spawn(async move {
            let embedding = match embedder.embed(&content).await {
                Ok(v) if !v.is_empty() => v,
                Ok(_) => return,
                Err(e) => {
                    debug!(error = %e, "memory embedding failed");
                    return;
                }
            };
            let record = MemoryRecord {
                content,
                role,
                embedding,
                owner,
            };
            if let Err(e) = store.store(record).await {
                debug!(error = %e, "memory write failed");
            }
        });
    }

    /// Retrieve memories relevant to `query`. Any failure yields an empty
    /// list.
    pub async fn recall(&self, query: &str) -> Vec<String> {
        let embedding = match self.embedder.embed(query).await {
            Ok(v) if !v.is_empty() => v,
            Ok(_) => return Vec::new(),
            Err(e) => {
                debug!(error = %e, "recall embedding failed");
                return Vec::new();
            }
        };

        match self
            .store
            .search(&embedding, self.threshold, self.recall_k)
            .await
        {
            Ok(memories) => memories,
            Err(e) => {
                debug!(error = %e, "memory search failed");
                Vec::new()
            }
        }
    }

    /// Append recalled context to a prompt. An empty recall leaves the
    /// prompt unmodified.
    pub fn enrich(&self, prompt: &str, memories: &[String]) -> String {
        if memories.is_empty() {
            return prompt.to_string();
        }
        format!(
            "{}\n\nRelevant context from memory:\n{}",
            prompt,
            memories.join("\n")
        )
    }
}

/// Store backed by a Supabase project: plain REST inserts plus a
/// `match_memories` RPC for similarity search.
pub struct SupabaseMemoryStore {
    client: Client,
    url: String,
    service_key: String,
}

impl SupabaseMemoryStore {
    pub fn new(url: String, service_key: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(SupabaseMemoryStore {
            client,
            url,
            service_key,
        })
    }

    pub fn from_env() -> Result<Self> {
        let url = std::env::var("SUPABASE_URL")
            .map_err(|_| anyhow!("SUPABASE_URL environment variable is not set"))?;
        let key = std::env::var("SUPABASE_SERVICE_KEY")
            .map_err(|_| anyhow!("SUPABASE_SERVICE_KEY environment variable is not set"))?;
        SupabaseMemoryStore::new(url, key)
    }
}

#[async_trait]
impl MemoryStore for SupabaseMemoryStore {
    async fn store(&self, record: MemoryRecord) -> Result<()> {
        let url = format!("{}/rest/v1/memories", self.url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .json(&record)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Memory insert failed: {}", response.status()));
        }
        Ok(())
    }

    async fn search(&self, embedding: &[f32], threshold: f32, k: usize) -> Result<Vec<String>> {
        let url = format!(
            "{}/rest/v1/rpc/match_memories",
            self.url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .json(&json!({
                "query_embedding": embedding,
                "match_threshold": threshold,
                "match_count": k,
            }))
            .send()
            .await?;

        let data: Value = match response.status() {
            StatusCode::OK => response.json().await?,
            status => return Err(anyhow!("Memory search failed: {}", status)),
        };

        let rows = data
            .as_array()
            .ok_or_else(|| anyhow!("Unexpected match_memories response shape"))?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("content").and_then(Value::as_str))
            .map(|s| s.to_string())
            .collect())
    }
}

/// In-process store with cosine similarity. Useful for tests and for
/// running without any external memory backend.
#[derive(Default)]
pub struct InMemoryStore {
    records: Mutex<Vec<MemoryRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore::default()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn store(&self, record: MemoryRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow!("memory store poisoned"))?
            .push(record);
        Ok(())
    }

    async fn search(&self, embedding: &[f32], threshold: f32, k: usize) -> Result<Vec<String>> {
        let records = self
            .records
            .lock()
            .map_err(|_| anyhow!("memory store poisoned"))?;
        let mut scored: Vec<(f32, String)> = records
            .iter()
            .map(|r| (cosine_similarity(embedding, &r.embedding), r.content.clone()))
            .filter(|(score, _)| *score >= threshold)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().take(k).map(|(_, c)| c).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(anyhow!("embedding backend down"))
        }
    }

    fn service(embedder: Arc<dyn Embedder>) -> (MemoryService, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (
            MemoryService::new(embedder, store.clone(), "tester"),
            store,
        )
    }

    #[tokio::test]
    async fn test_recall_failure_yields_empty() {
        let (service, _) = service(Arc::new(FailingEmbedder));
        assert!(service.recall("anything").await.is_empty());
    }

    #[tokio::test]
    async fn test_short_content_is_not_remembered() {
        let (service, store) = service(Arc::new(FixedEmbedder(vec![1.0, 0.0])));
        service.remember("hi", Role::User);
        tokio::task::yield_now().await;
        assert!(store.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_search_ranks_and_filters() -> Result<()> {
        let store = InMemoryStore::new();
        store
            .store(MemoryRecord {
                content: "close match".to_string(),
                role: Role::User,
                embedding: vec![1.0, 0.1],
                owner: "t".to_string(),
            })
            .await?;
        store
            .store(MemoryRecord {
                content: "orthogonal".to_string(),
                role: Role::User,
                embedding: vec![0.0, 1.0],
                owner: "t".to_string(),
            })
            .await?;

        let results = store.search(&[1.0, 0.0], 0.7, 5).await?;
        assert_eq!(results, vec!["close match"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_enrich_appends_context_only_when_present() {
        let (service, _) = service(Arc::new(NoopEmbedder));
        assert_eq!(service.enrich("prompt", &[]), "prompt");

        let enriched = service.enrich("prompt", &["fact one".to_string()]);
        assert!(enriched.starts_with("prompt\n\nRelevant context from memory:\nfact one"));
    }
}
