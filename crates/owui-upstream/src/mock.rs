//! In-memory upstream used by tests across the workspace
//!
//! Counts calls, serves a configurable catalog and scripted completions.

use async_trait::async_trait;
use owui_core::{Agent, UpstreamError};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::client::UpstreamClient;

/// Arguments of the most recent `complete` call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCompletion {
    pub model_id: String,
    pub prompt: String,
    pub parameters: Map<String, Value>,
}

pub struct MockUpstream {
    models: Mutex<Result<Vec<Agent>, UpstreamError>>,
    scripted: Mutex<VecDeque<Result<String, UpstreamError>>>,
    completion: Mutex<Result<String, UpstreamError>>,
    list_delay: Option<Duration>,
    list_calls: AtomicUsize,
    complete_calls: AtomicUsize,
    last_completion: Mutex<Option<RecordedCompletion>>,
}

impl MockUpstream {
    /// Catalog of bare agents with the given ids; completions answer "ok"
    pub fn with_ids(ids: &[&str]) -> Self {
        Self::new(ids.iter().map(|id| Agent::bare(*id)).collect())
    }

    pub fn new(agents: Vec<Agent>) -> Self {
        Self {
            models: Mutex::new(Ok(agents)),
            scripted: Mutex::new(VecDeque::new()),
            completion: Mutex::new(Ok("ok".to_string())),
            list_delay: None,
            list_calls: AtomicUsize::new(0),
            complete_calls: AtomicUsize::new(0),
            last_completion: Mutex::new(None),
        }
    }

    /// Make every `list_models` call take `delay` (tokio time)
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    pub fn set_models(&self, models: Result<Vec<Agent>, UpstreamError>) {
        *lock(&self.models) = models;
    }

    /// Default outcome for `complete` once the script is exhausted
    pub fn set_completion(&self, outcome: Result<String, UpstreamError>) {
        *lock(&self.completion) = outcome;
    }

    /// Queue a one-shot outcome for the next `complete` call
    pub fn push_completion(&self, outcome: Result<String, UpstreamError>) {
        lock(&self.scripted).push_back(outcome);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn last_completion(&self) -> Option<RecordedCompletion> {
        lock(&self.last_completion).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait]
impl UpstreamClient for MockUpstream {
    async fn list_models(&self) -> Result<Vec<Agent>, UpstreamError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.models).clone()
    }

    async fn complete(
        &self,
        model_id: &str,
        prompt: &str,
        parameters: &Map<String, Value>,
    ) -> Result<String, UpstreamError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_completion) = Some(RecordedCompletion {
            model_id: model_id.to_string(),
            prompt: prompt.to_string(),
            parameters: parameters.clone(),
        });
        let scripted = lock(&self.scripted).pop_front();
        scripted.unwrap_or_else(|| lock(&self.completion).clone())
    }
}
