//! Signed API client for the Ludice backend.

use crate::api::traits::{ApiError, ApiResponse, HttpRequest, Method, Transport};
use crate::config::{Endpoints, LudiceConfig};
use crate::crypto::{SignedRequest, Signer};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, error};

/// Current Unix time in seconds, with sub-second precision
pub fn unix_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Signs requests and sends them through a [`Transport`]
#[derive(Clone)]
pub struct LudiceApi {
    transport: Arc<dyn Transport>,
    signer: Signer,
    base_url: String,
    endpoints: Endpoints,
}

impl LudiceApi {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        secret_key: &str,
        endpoints: Endpoints,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            transport,
            signer: Signer::new(secret_key)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            endpoints,
        })
    }

    /// Client for the backend named in `config`
    pub fn from_config(
        transport: Arc<dyn Transport>,
        config: &LudiceConfig,
    ) -> Result<Self, ApiError> {
        Self::new(
            transport,
            config.api_base_url.clone(),
            &config.secret_key,
            config.endpoints.clone(),
        )
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn url(&self, endpoint: &str) -> Result<String, ApiError> {
        if !endpoint.starts_with('/') {
            return Err(ApiError::InvalidEndpoint(endpoint.to_string()));
        }
        Ok(format!("{}{}", self.base_url, endpoint))
    }

    /// Sign `payload` with the current time and build the request for `endpoint`
    pub fn signed_request(
        &self,
        endpoint: &str,
        payload: Map<String, Value>,
    ) -> Result<(HttpRequest, SignedRequest), ApiError> {
        let url = self.url(endpoint)?;
        let signed = SignedRequest::seal(payload, unix_timestamp(), &self.signer);
        let request = HttpRequest {
            method: Method::Post,
            url,
            body: Some(signed.clone().into_value()),
        };
        Ok((request, signed))
    }

    /// Make a signed POST request.
    ///
    /// Stamps `timestamp`, attaches `signature` and sends the body as JSON.
    /// Transport failures are returned as errors and never retried.
    pub async fn post(
        &self,
        endpoint: &str,
        payload: Map<String, Value>,
    ) -> Result<ApiResponse, ApiError> {
        let (request, signed) = self.signed_request(endpoint, payload)?;
        debug!("API request: {} {:?}", endpoint, signed.body());

        match self.transport.send(request).await {
            Ok(response) => {
                debug!("API response: {} {:?}", response.status, response.data);
                Ok(response)
            }
            Err(e) => {
                error!("API error on {}: {}", endpoint, e);
                Err(e)
            }
        }
    }

    /// Unsigned GET, for read-only endpoints
    pub async fn get(&self, endpoint: &str) -> Result<ApiResponse, ApiError> {
        let request = HttpRequest {
            method: Method::Get,
            url: self.url(endpoint)?,
            body: None,
        };
        debug!("API request: GET {}", endpoint);

        self.transport.send(request).await.map_err(|e| {
            error!("API error on {}: {}", endpoint, e);
            e
        })
    }

    /// Join or open a lobby for `bet`
    pub async fn start_game(&self, username: &str, bet: u64) -> Result<ApiResponse, ApiError> {
        self.post(
            &self.endpoints.start_game,
            object(json!({ "username": username, "bet": bet })),
        )
        .await
    }

    /// Submit a dice result
    pub async fn submit_result(
        &self,
        user_id: &str,
        game_id: &str,
        result: u8,
    ) -> Result<ApiResponse, ApiError> {
        self.post(
            &self.endpoints.write_result,
            object(json!({ "user_id": user_id, "game_id": game_id, "result": result })),
        )
        .await
    }

    /// Cancel an opponent search
    pub async fn cancel_search(
        &self,
        username: &str,
        game_id: &str,
    ) -> Result<ApiResponse, ApiError> {
        self.post(
            &self.endpoints.cancel_find,
            object(json!({ "username": username, "id": game_id })),
        )
        .await
    }

    /// Ask whether an opponent has joined our lobby
    pub async fn check_match(
        &self,
        username: &str,
        game_id: &str,
    ) -> Result<ApiResponse, ApiError> {
        self.post(
            &self.endpoints.check_match,
            object(json!({ "username": username, "id": game_id })),
        )
        .await
    }

    /// Fetch a user's balance
    pub async fn fetch_balance(&self, username: &str) -> Result<ApiResponse, ApiError> {
        self.get(&self.endpoints.balance_for(username)).await
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
