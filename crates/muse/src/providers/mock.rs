//! Scripted provider for tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::base::{CompletionRequest, Provider};

/// Returns its scripted replies in order; an exhausted script or a scripted
/// failure both surface as `Err`.
pub struct MockProvider {
    name: String,
    script: Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new<S: Into<String>>(name: S, script: Vec<Result<String, String>>) -> Self {
        MockProvider {
            name: name.into(),
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn succeeding<S: Into<String>, R: Into<String>>(name: S, reply: R) -> Self {
        MockProvider::new(name, vec![Ok(reply.into())])
    }

    pub fn failing<S: Into<String>>(name: S) -> Self {
        MockProvider::new(name, vec![Err("scripted failure".to_string())])
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Boxable handle to a shared [`MockProvider`], so tests can hand the
/// orchestrator ownership while keeping the call counter.
pub struct SharedProvider(pub Arc<MockProvider>);

#[async_trait]
impl Provider for SharedProvider {
    fn name(&self) -> &str {
        self.0.name()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.0.complete(request).await
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(anyhow!("{}: {}", self.name, message)),
            None => Err(anyhow!("{}: script exhausted", self.name)),
        }
    }
}
