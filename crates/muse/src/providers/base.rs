use anyhow::Result;
use async_trait::async_trait;

use crate::models::Role;

/// One prior conversational turn handed to a provider adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user<S: Into<String>>(content: S) -> Self {
        Turn {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Turn {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The minimal, provider-agnostic completion contract: ordered prior turns
/// plus a new prompt. Each adapter maps this onto its native request shape.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub history: Vec<Turn>,
    pub prompt: String,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new<S: Into<String>, P: Into<String>>(
        system: S,
        history: Vec<Turn>,
        prompt: P,
        temperature: f32,
    ) -> Self {
        CompletionRequest {
            system: system.into(),
            history,
            prompt: prompt.into(),
            temperature,
        }
    }

    pub fn prompt_only<S: Into<String>, P: Into<String>>(
        system: S,
        prompt: P,
        temperature: f32,
    ) -> Self {
        CompletionRequest::new(system, Vec::new(), prompt, temperature)
    }
}

/// Base trait for providers. A failure must be surfaced as an `Err`,
/// distinguishable from a valid (possibly empty) response.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
