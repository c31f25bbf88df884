//! Tool dispatch: executes a parsed, complete invocation against a fixed
//! set of capabilities and renders the outcome as a result string.
//!
//! The dispatcher never raises toward the caller. Collaborator failures are
//! folded into short, human-readable error strings inside the result slot,
//! so one broken capability cannot abort the rest of a turn. Idempotency is
//! the caller's responsibility (see [`crate::engine::ToolGate`]).

pub mod backend;
pub mod image;
pub mod payload;
pub mod search;

use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

use crate::errors::{EngineError, EngineResult};
use crate::protocol::{strip_code_fence, ToolInvocation};
use crate::providers::base::{CompletionRequest, Provider};

use self::backend::ProjectBackend;
use self::image::{ImageGenerator, PollinationsGenerator};
use self::payload::{with_payload, ImageReview, ResultPayload};
use self::search::SearchClient;

pub const UNKNOWN_TOOL_RESULT: &str = "Unknown tool";
pub const SEARCH_ERROR_RESULT: &str = "Error performing search.";

pub const SEARCH_RESULT_LIMIT: usize = 5;

/// Closed set of capabilities a model may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    SearchWeb,
    GenerateImage,
    CreateArtifact,
    SequentialThinking,
    SaveKnowledge,
    CodebaseSearch,
    IndexCodebase,
    ListDir,
    ReadFile,
    WriteFile,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::SearchWeb => "search_web",
            ToolName::GenerateImage => "generate_image",
            ToolName::CreateArtifact => "create_artifact",
            ToolName::SequentialThinking => "sequential_thinking",
            ToolName::SaveKnowledge => "save_knowledge",
            ToolName::CodebaseSearch => "codebase_search",
            ToolName::IndexCodebase => "index_codebase",
            ToolName::ListDir => "list_dir",
            ToolName::ReadFile => "read_file",
            ToolName::WriteFile => "write_file",
        }
    }

    /// Tools delegated to the project backend rather than run in-process.
    fn is_backend_delegated(&self) -> bool {
        matches!(
            self,
            ToolName::SaveKnowledge
                | ToolName::CodebaseSearch
                | ToolName::IndexCodebase
                | ToolName::ListDir
                | ToolName::ReadFile
                | ToolName::WriteFile
        )
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "search_web" => Ok(ToolName::SearchWeb),
            "generate_image" => Ok(ToolName::GenerateImage),
            "create_artifact" => Ok(ToolName::CreateArtifact),
            "sequential_thinking" => Ok(ToolName::SequentialThinking),
            "save_knowledge" => Ok(ToolName::SaveKnowledge),
            "codebase_search" => Ok(ToolName::CodebaseSearch),
            "index_codebase" => Ok(ToolName::IndexCodebase),
            "list_dir" => Ok(ToolName::ListDir),
            "read_file" => Ok(ToolName::ReadFile),
            "write_file" => Ok(ToolName::WriteFile),
            other => Err(EngineError::UnknownTool(other.to_string())),
        }
    }
}

pub struct Dispatcher {
    search: Option<Arc<dyn SearchClient>>,
    images: Arc<dyn ImageGenerator>,
    critic: Option<Arc<dyn Provider>>,
    backend: Option<Arc<dyn ProjectBackend>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Dispatcher::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher {
            search: None,
            images: Arc::new(PollinationsGenerator::default()),
            critic: None,
            backend: None,
        }
    }

    pub fn with_search(mut self, search: Arc<dyn SearchClient>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_images(mut self, images: Arc<dyn ImageGenerator>) -> Self {
        self.images = images;
        self
    }

    /// Provider used for the best-effort image critique call.
    pub fn with_critic(mut self, critic: Arc<dyn Provider>) -> Self {
        self.critic = Some(critic);
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn ProjectBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Execute one complete invocation. Never raises: every failure mode
    /// maps to a result string the caller can surface inline.
    pub async fn execute(&self, invocation: &ToolInvocation) -> String {
        let tool = match ToolName::from_str(&invocation.name) {
            Ok(tool) => tool,
            Err(_) => {
                warn!(tool = %invocation.name, "unknown tool requested");
                return UNKNOWN_TOOL_RESULT.to_string();
            }
        };

        match self.run(tool, &invocation.args).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %tool, error = %e, "tool execution failed");
                format!("Error executing {}: {}", tool, e)
            }
        }
    }

    async fn run(&self, tool: ToolName, args: &Map<String, Value>) -> EngineResult<String> {
        if tool.is_backend_delegated() {
            return Ok(self.run_backend(tool, args).await);
        }

        match tool {
            ToolName::SearchWeb => {
                let query = require_str(tool, args, "query")?;
                Ok(self.run_search(query).await)
            }
            ToolName::GenerateImage => {
                let prompt = require_str(tool, args, "prompt")?;
                let aspect_ratio = args
                    .get("aspect_ratio")
                    .and_then(Value::as_str)
                    .unwrap_or("1:1");
                Ok(self.run_generate_image(prompt, aspect_ratio).await)
            }
            ToolName::CreateArtifact => {
                let filename = require_str(tool, args, "filename")?;
                let content = require_str(tool, args, "content")?;
                let language = args
                    .get("language")
                    .and_then(Value::as_str)
                    .unwrap_or("plaintext");
                // Pure echo with a status flag; nothing is executed. The
                // editor surface downstream consumes this JSON directly.
                Ok(json!({
                    "name": filename,
                    "content": content,
                    "language": language,
                    "status": "success",
                })
                .to_string())
            }
            ToolName::SequentialThinking => {
                let thought = require_str(tool, args, "thought")?;
                let number = args
                    .get("thoughtNumber")
                    .and_then(Value::as_u64)
                    .unwrap_or(1);
                let total = args
                    .get("totalThoughts")
                    .and_then(Value::as_u64)
                    .unwrap_or(number);
                Ok(format!("Thought {}/{}: {}", number, total, thought))
            }
            _ => unreachable!("backend-delegated tools handled above"),
        }
    }

    async fn run_search(&self, query: &str) -> String {
        let client = match &self.search {
            Some(client) => client,
            None => return SEARCH_ERROR_RESULT.to_string(),
        };

        match client.search(query, SEARCH_RESULT_LIMIT).await {
            Ok(results) => {
                let text = format!("Found {} results for \"{}\".", results.len(), query);
                with_payload(
                    &text,
                    &ResultPayload::SearchResults {
                        query: query.to_string(),
                        results,
                        is_cached: false,
                    },
                )
            }
            Err(e) => {
                warn!(error = %e, "web search failed");
                SEARCH_ERROR_RESULT.to_string()
            }
        }
    }

    async fn run_generate_image(&self, prompt: &str, aspect_ratio: &str) -> String {
        let url = self.images.image_url(prompt, aspect_ratio);
        // Critique is best-effort. A failed second call must never block
        // delivery of the image itself.
        let review = self.review_image(prompt).await;

        let text = format!(
            "Here is the image you requested.\n\n![Generated image]({})",
            url
        );
        with_payload(
            &text,
            &ResultPayload::Image {
                url,
                prompt: prompt.to_string(),
                aspect_ratio: aspect_ratio.to_string(),
                review,
            },
        )
    }

    async fn review_image(&self, prompt: &str) -> Option<ImageReview> {
        let critic = self.critic.as_ref()?;
        let request = CompletionRequest::prompt_only(
            "You are a concise art director. Respond with a single JSON object and nothing else.",
            format!(
                "An image was generated from this prompt: \"{}\". Write a critique as JSON with \
                 string fields title, description, style, lighting, composition, mood, and a \
                 color_palette array of hex color strings.",
                prompt
            ),
            0.7,
        );

        match critic.complete(&request).await {
            Ok(text) => match serde_json::from_str::<ImageReview>(strip_code_fence(&text)) {
                Ok(review) => Some(review),
                Err(e) => {
                    warn!(error = %e, "image critique did not decode");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "image critique call failed");
                None
            }
        }
    }

    async fn run_backend(&self, tool: ToolName, args: &Map<String, Value>) -> String {
        let unavailable = format!(
            "Error connecting to backend for tool {}. Is the local server running?",
            tool
        );
        let backend = match &self.backend {
            Some(backend) => backend,
            None => return unavailable,
        };

        match backend
            .execute(tool.as_str(), &Value::Object(args.clone()))
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %tool, error = %e, "backend tool failed");
                unavailable
            }
        }
    }
}

fn require_str<'a>(
    tool: ToolName,
    args: &'a Map<String, Value>,
    key: &str,
) -> EngineResult<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("missing string argument '{}'", key),
        })
}
