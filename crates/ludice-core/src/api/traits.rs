//! Transport trait and the request/response types it moves.

use crate::crypto::SignatureError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors from API calls
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Signing failed: {0}")]
    Signing(#[from] SignatureError),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// HTTP method used by the backend API
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
}

/// A fully built request, ready for the transport
#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    /// JSON body, sent with `Content-Type: application/json`
    pub body: Option<Value>,
}

/// Response body: parsed JSON, or the raw text when it is not JSON
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str(raw)
            .map(ResponseBody::Json)
            .unwrap_or_else(|_| ResponseBody::Text(raw.to_string()))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    /// Body read as a bare string with surrounding quote characters removed.
    ///
    /// The server answers a successful join with a JSON-quoted id, which may
    /// arrive parsed or as text depending on the content type.
    pub fn unquoted(&self) -> String {
        let raw = match self {
            ResponseBody::Json(Value::String(s)) => s.clone(),
            ResponseBody::Json(other) => other.to_string(),
            ResponseBody::Text(text) => text.trim().to_string(),
        };
        raw.trim_matches('"').to_string()
    }

    /// The `detail` field of an error body
    pub fn detail(&self) -> Option<&str> {
        self.as_json()?.get("detail")?.as_str()
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_json()?.as_bool()
    }

    pub fn as_u64(&self) -> Option<u64> {
        let value = self.as_json()?;
        value
            .as_u64()
            .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
    }
}

/// Normalized API response
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub data: ResponseBody,
    /// True for 2xx statuses
    pub ok: bool,
}

impl ApiResponse {
    pub fn new(status: u16, data: ResponseBody) -> Self {
        Self {
            status,
            data,
            ok: (200..300).contains(&status),
        }
    }
}

/// Trait for moving requests to the backend
///
/// Implementations:
/// - ReqwestTransport for real HTTP
/// - MockTransport for tests
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request. Transport-level failures are errors; any HTTP
    /// status, including 4xx/5xx, is a successful response.
    async fn send(&self, request: HttpRequest) -> Result<ApiResponse, ApiError>;
}
