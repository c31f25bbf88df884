//! The per-turn pipeline: intent detection, memory enrichment, the model
//! cascade, and the tool loop, committed into a [`Conversation`].
//!
//! Every code path that can fail still settles the pending assistant
//! message; nothing may leave a message stuck with `is_streaming = true`.

use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::conversation::Conversation;
use crate::detector::IntentDetector;
use crate::memory::MemoryService;
use crate::models::{Message, MessagePatch, Role};
use crate::orchestrator::ModelOrchestrator;
use crate::protocol::{self, ToolScan};
use crate::providers::base::{CompletionRequest, Turn};
use crate::tools::Dispatcher;

pub const COULD_NOT_PROCESS_MESSAGE: &str =
    "I could not process that action. Please try rephrasing your request.";

pub const MAX_ITERATIONS_NOTICE: &str = "[System: Max tool iterations reached]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReasoningMode {
    #[default]
    Normal,
    /// Nudges the model toward live information.
    Search,
    /// Slower, lower-temperature reasoning.
    Deep,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub system_prompt: String,
    pub temperature: f32,
    pub deep_temperature: f32,
    pub max_tool_iterations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            system_prompt: "You are a capable, honest assistant. When a tool is needed, reply \
                            with exactly one tool call using the :::TOOL_CALL::: format."
                .to_string(),
            temperature: 0.7,
            deep_temperature: 0.3,
            max_tool_iterations: 5,
        }
    }
}

/// Transition detector for tool dispatch. Classification runs repeatedly
/// over a growing buffer; dispatch must fire on the transition *into*
/// `complete`, not merely while in it.
#[derive(Debug, Default)]
pub struct ToolGate {
    dispatched: HashSet<Uuid>,
}

impl ToolGate {
    /// True exactly once per message id while the scan is complete.
    pub fn admit(&mut self, message_id: Uuid, scan: &ToolScan) -> bool {
        matches!(scan, ToolScan::Complete(_)) && self.dispatched.insert(message_id)
    }

    /// Re-arm the gate after the buffer has been replaced wholesale (a new
    /// model round), so the next logical call can dispatch.
    pub fn clear(&mut self, message_id: Uuid) {
        self.dispatched.remove(&message_id);
    }
}

pub struct Engine {
    orchestrator: ModelOrchestrator,
    dispatcher: Dispatcher,
    memory: Arc<MemoryService>,
    detector: Option<Arc<dyn IntentDetector>>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        orchestrator: ModelOrchestrator,
        dispatcher: Dispatcher,
        memory: Arc<MemoryService>,
    ) -> Self {
        Engine {
            orchestrator,
            dispatcher,
            memory,
            detector: None,
            config: EngineConfig::default(),
        }
    }

    pub fn with_detector(mut self, detector: Arc<dyn IntentDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one full turn for `user_text`. Returns the id of the assistant
    /// message, which is settled by the time this returns.
    pub async fn respond(
        &self,
        conversation: &mut Conversation,
        user_text: &str,
        mode: ReasoningMode,
    ) -> Uuid {
        let history = history_turns(conversation.messages());
        conversation.add(Message::user(user_text));

        let pending = Message::pending_assistant();
        let id = pending.id;
        conversation.add(pending);

        self.run_turn(conversation, id, user_text, history, mode)
            .await;
        id
    }

    /// Re-run the pipeline for the last user message, per the
    /// branch-by-truncation contract: a trailing assistant message is
    /// removed first. Nothing from the previous attempt is reused.
    pub async fn regenerate(
        &self,
        conversation: &mut Conversation,
        mode: ReasoningMode,
    ) -> Option<Uuid> {
        let target = conversation.regenerate_target()?;
        let index = conversation
            .messages()
            .iter()
            .position(|m| m.id == target)?;
        let user_text = conversation.messages()[index].content.clone();
        let history = history_turns(&conversation.messages()[..index]);

        let pending = Message::pending_assistant();
        let id = pending.id;
        conversation.add(pending);

        self.run_turn(conversation, id, &user_text, history, mode)
            .await;
        Some(id)
    }

    async fn run_turn(
        &self,
        conversation: &mut Conversation,
        id: Uuid,
        user_text: &str,
        history: Vec<Turn>,
        mode: ReasoningMode,
    ) {
        if let Some(detector) = &self.detector {
            if let Some(answer) = detector.try_handle(user_text).await {
                let cleaned = protocol::strip_markers(&answer);
                self.memory.remember(user_text, Role::User);
                self.memory.remember(&cleaned, Role::Assistant);
                conversation.update(id, MessagePatch::settle(cleaned));
                conversation.clear_attachments();
                return;
            }
        }

        let temperature = match mode {
            ReasoningMode::Deep => self.config.deep_temperature,
            _ => self.config.temperature,
        };
        let prompt = shaped_prompt(mode, user_text);
        let memories = self.memory.recall(user_text).await;
        let prompt = self.memory.enrich(&prompt, &memories);
        self.memory.remember(user_text, Role::User);

        let request =
            CompletionRequest::new(&self.config.system_prompt, history.clone(), prompt, temperature);
        let mut text = self.orchestrator.generate(&request).await;
        conversation.update(id, MessagePatch::content(text.clone()));

        let mut turns = history;
        turns.push(Turn::user(request.prompt.clone()));

        let mut gate = ToolGate::default();
        for _ in 0..self.config.max_tool_iterations {
            let scan = protocol::classify(&text);
            let admitted = gate.admit(id, &scan);
            match scan {
                ToolScan::Complete(ref invocation) if admitted => {
                    let result = self.dispatcher.execute(invocation).await;
                    turns.push(Turn::assistant(text.clone()));
                    let tool_output = format!("TOOL_OUTPUT ({}): {}", invocation.name, result);
                    let request = CompletionRequest::new(
                        &self.config.system_prompt,
                        turns.clone(),
                        &tool_output,
                        temperature,
                    );
                    text = self.orchestrator.generate(&request).await;
                    turns.push(Turn::user(tool_output));
                    // The buffer was replaced wholesale; the next complete
                    // call is a new logical invocation.
                    gate.clear(id);
                    conversation.update(id, MessagePatch::content(text.clone()));
                }
                ToolScan::Malformed => {
                    text = COULD_NOT_PROCESS_MESSAGE.to_string();
                    break;
                }
                _ => break,
            }
        }

        if matches!(protocol::classify(&text), ToolScan::Complete(_)) {
            text.push_str("\n\n");
            text.push_str(MAX_ITERATIONS_NOTICE);
        }

        self.memory.remember(&text, Role::Assistant);
        conversation.update(id, MessagePatch::settle(text));
        conversation.clear_attachments();
    }
}

fn shaped_prompt(mode: ReasoningMode, user_text: &str) -> String {
    match mode {
        ReasoningMode::Normal => user_text.to_string(),
        ReasoningMode::Search => format!(
            "Search the web for current information before answering.\n\n{}",
            user_text
        ),
        ReasoningMode::Deep => format!(
            "Think step by step and reason carefully before answering.\n\n{}",
            user_text
        ),
    }
}

/// Settled messages as provider turns. In-flight messages are skipped.
fn history_turns(messages: &[Message]) -> Vec<Turn> {
    messages
        .iter()
        .filter(|m| !m.is_streaming)
        .map(|m| Turn {
            role: m.role,
            content: m.content.clone(),
        })
        .collect()
}
