//! Two-tier provider fallback.
//!
//! Tier 1 walks every (credential, model) pair of the primary provider in
//! order. Tier 2 tries each alternate provider once, in order. All calls are
//! strictly sequential; ordering encodes quality/latency priority and is
//! never randomized. If everything fails the caller still gets a usable,
//! clearly labeled degraded-service string, never an error.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

use crate::errors::EngineError;
use crate::providers::base::{CompletionRequest, Provider};
use crate::providers::gemini::GeminiClient;

pub const DEGRADED_SERVICE_MESSAGE: &str = "I'm sorry, all AI services are currently \
unavailable. This is an automated degraded-service reply; please try again in a moment.";

pub struct ModelOrchestrator {
    primary: Option<Arc<GeminiClient>>,
    alternates: Vec<Box<dyn Provider>>,
}

impl ModelOrchestrator {
    pub fn new(primary: Option<Arc<GeminiClient>>, alternates: Vec<Box<dyn Provider>>) -> Self {
        ModelOrchestrator {
            primary,
            alternates,
        }
    }

    /// Resolve a request to text. Infallible by design: a broken backend
    /// must never produce a broken turn.
    pub async fn generate(&self, request: &CompletionRequest) -> String {
        // A deployment without a primary is a valid configuration, not a
        // per-turn failure worth warning about.
        if self.primary.is_some() {
            match self.try_primary(request).await {
                Ok(text) => return text,
                Err(e) => warn!(error = %e, "primary provider tier failed"),
            }
        }

        for alternate in &self.alternates {
            match alternate.complete(request).await {
                Ok(text) => return text,
                Err(e) => {
                    warn!(provider = alternate.name(), error = %e, "alternate provider failed")
                }
            }
        }

        DEGRADED_SERVICE_MESSAGE.to_string()
    }

    /// Tier-1 grid search. Each (credential, model) pair is attempted at
    /// most once; a structural rejection advances the grid the same way a
    /// transient failure does.
    async fn try_primary(&self, request: &CompletionRequest) -> Result<String, EngineError> {
        let client = match &self.primary {
            Some(client) => client,
            None => return Err(EngineError::GridExhausted(0)),
        };

        let config = client.config();
        let mut attempted: HashSet<(String, String)> = HashSet::new();
        let mut attempts = 0;

        for api_key in &config.api_keys {
            for model in &config.models {
                if !attempted.insert((api_key.clone(), model.clone())) {
                    continue;
                }
                attempts += 1;
                match client.generate(api_key, model, request).await {
                    Ok(text) => return Ok(text),
                    Err(e) => warn!(model = %model, error = %e, "grid cell failed"),
                }
            }
        }

        Err(EngineError::GridExhausted(attempts))
    }
}
