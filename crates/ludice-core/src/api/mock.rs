//! Scripted transport for testing.

use super::traits::{ApiError, ApiResponse, HttpRequest, ResponseBody, Transport};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Scripted outcome of one request
#[derive(Clone, Debug)]
enum Scripted {
    Respond(ApiResponse),
    Fail(String),
}

/// In-memory transport that replays scripted responses and records requests
#[derive(Clone, Default)]
pub struct MockTransport {
    /// Outcomes handed out in order, one per request
    script: Arc<Mutex<VecDeque<Scripted>>>,
    /// Every request seen, in arrival order
    requests: Arc<Mutex<Vec<HttpRequest>>>,
    /// When set, requests wait here until released
    gate: Arc<Mutex<Option<Arc<Notify>>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response; `body` is parsed like a real response body
    pub fn respond(&self, status: u16, body: &str) {
        let response = ApiResponse::new(status, ResponseBody::parse(body));
        lock(&self.script).push_back(Scripted::Respond(response));
    }

    /// Queue a JSON response
    pub fn respond_json(&self, status: u16, body: Value) {
        let response = ApiResponse::new(status, ResponseBody::Json(body));
        lock(&self.script).push_back(Scripted::Respond(response));
    }

    /// Queue a transport failure
    pub fn fail(&self, message: &str) {
        lock(&self.script).push_back(Scripted::Fail(message.to_string()));
    }

    /// Hold every following request until [`MockTransport::release`]
    pub fn pause(&self) {
        *lock(&self.gate) = Some(Arc::new(Notify::new()));
    }

    /// Let a held request through and stop holding new ones
    pub fn release(&self) {
        if let Some(gate) = lock(&self.gate).take() {
            gate.notify_one();
        }
    }

    /// All requests seen so far
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Scripted outcomes not yet consumed
    pub fn pending_responses(&self) -> usize {
        lock(&self.script).len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<ApiResponse, ApiError> {
        lock(&self.requests).push(request);

        let gate = lock(&self.gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        match lock(&self.script).pop_front() {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(ApiError::Network(message)),
            None => Err(ApiError::Network("no scripted response".to_string())),
        }
    }
}
