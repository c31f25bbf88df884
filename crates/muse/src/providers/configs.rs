//! Per-provider configuration, sourced from the environment.

use anyhow::{anyhow, Result};

pub const GEMINI_DEFAULT_HOST: &str = "https://generativelanguage.googleapis.com";
pub const OPENAI_DEFAULT_HOST: &str = "https://api.openai.com";
pub const GROQ_DEFAULT_HOST: &str = "https://api.groq.com/openai";
pub const DEEPSEEK_DEFAULT_HOST: &str = "https://api.deepseek.com";
pub const ANTHROPIC_DEFAULT_HOST: &str = "https://api.anthropic.com";

pub const GEMINI_DEFAULT_MODELS: &[&str] =
    &["gemini-2.5-flash", "gemini-2.5-pro", "gemini-2.0-flash"];

/// Primary provider configuration. Credentials and model variants are both
/// ordered: the orchestrator walks every (credential, model) pair in this
/// exact order.
#[derive(Debug, Clone)]
pub struct GeminiProviderConfig {
    pub host: String,
    pub api_keys: Vec<String>,
    pub models: Vec<String>,
    pub max_output_tokens: i32,
}

impl GeminiProviderConfig {
    pub fn new(host: String, api_keys: Vec<String>) -> Self {
        GeminiProviderConfig {
            host,
            api_keys: dedup_keys(api_keys),
            models: GEMINI_DEFAULT_MODELS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            max_output_tokens: 2048,
        }
    }

    /// Reads `GEMINI_API_KEY` plus an optional backup key from
    /// `GEMINI_API_KEY_BACKUP` or `GOOGLE_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let primary = std::env::var("GEMINI_API_KEY").unwrap_or_default();
        let backup = std::env::var("GEMINI_API_KEY_BACKUP")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .unwrap_or_default();

        let keys = dedup_keys(vec![primary, backup]);
        if keys.is_empty() {
            return Err(anyhow!("Missing Gemini API key"));
        }
        Ok(GeminiProviderConfig::new(
            GEMINI_DEFAULT_HOST.to_string(),
            keys,
        ))
    }
}

fn dedup_keys(keys: Vec<String>) -> Vec<String> {
    let mut seen = Vec::new();
    for key in keys {
        let key = key.trim().to_string();
        if !key.is_empty() && !seen.contains(&key) {
            seen.push(key);
        }
    }
    seen
}

/// Configuration for any OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleConfig {
    pub name: String,
    pub host: String,
    pub api_key: String,
    pub model: String,
    /// Some services expect a system message, some reject one.
    pub system_prompt: Option<String>,
    pub max_tokens: Option<i32>,
}

impl OpenAiCompatibleConfig {
    pub fn openai(api_key: String) -> Self {
        OpenAiCompatibleConfig {
            name: "openai".to_string(),
            host: OPENAI_DEFAULT_HOST.to_string(),
            api_key,
            model: "gpt-4o".to_string(),
            system_prompt: None,
            max_tokens: None,
        }
    }

    pub fn groq(api_key: String) -> Self {
        OpenAiCompatibleConfig {
            name: "groq".to_string(),
            host: GROQ_DEFAULT_HOST.to_string(),
            api_key,
            model: "llama-3.3-70b-versatile".to_string(),
            system_prompt: Some("You are a helpful AI assistant.".to_string()),
            max_tokens: None,
        }
    }

    pub fn deepseek(api_key: String) -> Self {
        OpenAiCompatibleConfig {
            name: "deepseek".to_string(),
            host: DEEPSEEK_DEFAULT_HOST.to_string(),
            api_key,
            model: "deepseek-chat".to_string(),
            system_prompt: Some("You are a helpful AI assistant.".to_string()),
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnthropicProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: i32,
}

impl AnthropicProviderConfig {
    pub fn new(api_key: String) -> Self {
        AnthropicProviderConfig {
            host: ANTHROPIC_DEFAULT_HOST.to_string(),
            api_key,
            model: "claude-3-5-sonnet-20240620".to_string(),
            max_tokens: 1024,
        }
    }
}
