//! HTTP transport for the game backend.
//!
//! This module provides the real implementation of `Transport`, talking to the
//! backend over reqwest.

use crate::api::traits::{ApiError, ApiResponse, HttpRequest, Method, ResponseBody, Transport};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// reqwest-backed transport
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Use an existing client (shared connection pool, custom TLS, ...)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<ApiResponse, ApiError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        if let Some(body) = &request.body {
            // .json() sets Content-Type: application/json
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        debug!("{:?} {} <- {} {}", request.method, request.url, status, text);

        Ok(ApiResponse::new(status, ResponseBody::parse(&text)))
    }
}
