//! Ludicé Mock Backend
//!
//! In-memory stand-in for the Ludicé game server. It checks request
//! signatures and rate limits the way the real server does, pairs players
//! into lobbies by equal bet and keeps a balance per user.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ludice_core::{
    api::unix_timestamp,
    crypto::{Signer, MAX_SIGNATURE_AGE_SECS},
    SignatureError,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Error answered as `{"detail": ...}`, like the real server
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    detail: Value,
}

impl AppError {
    fn new(status: StatusCode, detail: impl Into<Value>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    fn bad_request(detail: impl Into<Value>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<SignatureError> for AppError {
    fn from(e: SignatureError) -> Self {
        warn!("Rejected request: {}", e);
        AppError::new(StatusCode::FORBIDDEN, "Invalid signature - data tampered")
    }
}

/// Backend settings
#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub secret_key: String,
    /// Minimum gap between two calls from the same user
    pub rate_limit: Duration,
    /// Balance of a user seen for the first time
    pub default_balance: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            secret_key: "our_secret_key".to_string(),
            rate_limit: Duration::from_secs(1),
            default_balance: 100,
        }
    }
}

/// A game record. Open while one player waits, full with two.
#[derive(Clone, Debug, Serialize)]
pub struct Lobby {
    pub id: String,
    pub bet: u64,
    pub players: Vec<String>,
    pub results: HashMap<String, u8>,
}

impl Lobby {
    fn is_open(&self) -> bool {
        self.players.len() == 1
    }

    fn is_full(&self) -> bool {
        self.players.len() == 2
    }
}

/// Backend state
pub struct BackendState {
    config: BackendConfig,
    signer: Signer,
    /// Lobbies in creation order; the oldest open one is joined first
    lobbies: RwLock<Vec<Lobby>>,
    balances: RwLock<HashMap<String, u64>>,
    last_call: Mutex<HashMap<String, Instant>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BackendState {
    pub fn new(config: BackendConfig) -> Result<Self, SignatureError> {
        Ok(Self {
            signer: Signer::new(&config.secret_key)?,
            config,
            lobbies: RwLock::new(Vec::new()),
            balances: RwLock::new(HashMap::new()),
            last_call: Mutex::new(HashMap::new()),
        })
    }

    /// Set a user's balance
    pub fn set_balance(&self, username: &str, balance: u64) {
        write(&self.balances).insert(username.to_string(), balance);
    }

    /// Snapshot of a lobby
    pub fn lobby(&self, id: &str) -> Option<Lobby> {
        read(&self.lobbies).iter().find(|l| l.id == id).cloned()
    }

    pub fn lobby_count(&self) -> usize {
        read(&self.lobbies).len()
    }

    /// Allow at most one call per user per rate-limit window
    fn throttle(&self, username: &str) -> Result<(), AppError> {
        if self.config.rate_limit.is_zero() {
            return Ok(());
        }

        let now = Instant::now();
        let mut last_call = lock(&self.last_call);
        if let Some(previous) = last_call.get(username) {
            if now.duration_since(*previous) < self.config.rate_limit {
                debug!("Rate limited {}", username);
                return Err(AppError::new(
                    StatusCode::TOO_MANY_REQUESTS,
                    "Too many requests",
                ));
            }
        }
        last_call.insert(username.to_string(), now);
        last_call.retain(|_, seen| now.duration_since(*seen) < Duration::from_secs(3600));
        Ok(())
    }

    fn verify(&self, body: &Map<String, Value>) -> Result<(), AppError> {
        self.signer
            .verify_fresh(body, unix_timestamp(), MAX_SIGNATURE_AGE_SECS)?;
        Ok(())
    }
}

// === Request types ===

#[derive(Deserialize)]
struct StartGameRequest {
    username: String,
    bet: u64,
}

#[derive(Deserialize)]
struct LobbyRequest {
    username: String,
    id: String,
}

#[derive(Deserialize)]
struct WriteResultRequest {
    user_id: String,
    game_id: String,
    result: u8,
}

/// Parse a signed body into its typed form, keeping the raw fields for
/// signature checks
fn parse<T: DeserializeOwned>(body: &Map<String, Value>) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(body.clone()))
        .map_err(|e| AppError::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
}

// === Route handlers ===

async fn index() -> Json<&'static str> {
    Json("Ludice API")
}

async fn start_game(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<String>, AppError> {
    let req: StartGameRequest = parse(&body)?;
    state.throttle(&req.username)?;
    state.verify(&body)?;

    let mut lobbies = write(&state.lobbies);

    if let Some(lobby) = lobbies
        .iter_mut()
        .find(|l| l.is_open() && l.bet == req.bet && !l.players.contains(&req.username))
    {
        lobby.players.push(req.username.clone());
        info!("{} joined lobby {} (bet {})", req.username, lobby.id, req.bet);
        return Ok(Json(lobby.id.clone()));
    }

    let id = Uuid::new_v4().simple().to_string();
    lobbies.push(Lobby {
        id: id.clone(),
        bet: req.bet,
        players: vec![req.username.clone()],
        results: HashMap::new(),
    });
    info!("{} opened lobby {} (bet {})", req.username, id, req.bet);

    // The creator is told to wait with the lobby id as the error detail
    Err(AppError::bad_request(id))
}

async fn cancel_find(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<bool>, AppError> {
    let req: LobbyRequest = parse(&body)?;
    state.throttle(&req.username)?;
    state.verify(&body)?;

    let mut lobbies = write(&state.lobbies);
    let position = lobbies
        .iter()
        .position(|l| l.id == req.id && l.is_open() && l.players.contains(&req.username));

    match position {
        Some(index) => {
            lobbies.remove(index);
            info!("{} cancelled lobby {}", req.username, req.id);
            Ok(Json(true))
        }
        None => Ok(Json(false)),
    }
}

async fn check_match(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<bool>, AppError> {
    let req: LobbyRequest = parse(&body)?;
    state.throttle(&req.username)?;
    state.verify(&body)?;

    let lobbies = read(&state.lobbies);
    let lobby = lobbies
        .iter()
        .find(|l| l.id == req.id && l.players.contains(&req.username))
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, "Game not found"))?;

    Ok(Json(lobby.is_full()))
}

async fn write_result(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<bool>, AppError> {
    let req: WriteResultRequest = parse(&body)?;
    state.verify(&body)?;

    let mut lobbies = write(&state.lobbies);
    let Some(lobby) = lobbies.iter_mut().find(|l| l.id == req.game_id) else {
        return Ok(Json(false));
    };
    if !lobby.is_full() || !lobby.players.contains(&req.user_id) {
        return Ok(Json(false));
    }

    lobby.results.insert(req.user_id.clone(), req.result);
    info!("{} rolled {} in {}", req.user_id, req.result, req.game_id);
    Ok(Json(true))
}

async fn get_balance(
    State(state): State<Arc<BackendState>>,
    Path(username): Path<String>,
) -> Result<Json<u64>, AppError> {
    state.throttle(&username)?;

    let balance = *write(&state.balances)
        .entry(username)
        .or_insert(state.config.default_balance);
    Ok(Json(balance))
}

pub fn create_router(state: Arc<BackendState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/start/game", post(start_game))
        .route("/cancel/find", post(cancel_find))
        .route("/check/match", post(check_match))
        .route("/write/res", post(write_result))
        .route("/get/:username/balance", get(get_balance))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ludice_core::SignedRequest;

    fn state(rate_limit: Duration) -> BackendState {
        BackendState::new(BackendConfig {
            rate_limit,
            ..BackendConfig::default()
        })
        .unwrap()
    }

    fn signed(state: &BackendState, fields: Value, timestamp: f64) -> Map<String, Value> {
        let Value::Object(fields) = fields else {
            panic!("fields must be an object");
        };
        SignedRequest::seal(fields, timestamp, &state.signer)
            .body()
            .clone()
    }

    #[test]
    fn test_throttle_per_user() {
        let state = state(Duration::from_secs(1));

        assert!(state.throttle("alice").is_ok());
        let err = state.throttle("alice").unwrap_err();
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert!(state.throttle("bob").is_ok());
    }

    #[test]
    fn test_throttle_disabled() {
        let state = state(Duration::ZERO);
        assert!(state.throttle("alice").is_ok());
        assert!(state.throttle("alice").is_ok());
    }

    #[test]
    fn test_verify_rejects_stale_and_tampered() {
        let state = state(Duration::ZERO);
        let now = unix_timestamp();

        let fresh = signed(&state, json!({"username": "alice", "bet": 50}), now);
        assert!(state.verify(&fresh).is_ok());

        let stale = signed(&state, json!({"username": "alice", "bet": 50}), now - 301.0);
        assert_eq!(state.verify(&stale).unwrap_err().status, StatusCode::FORBIDDEN);

        let mut tampered = fresh.clone();
        tampered.insert("bet".to_string(), json!(5000));
        assert_eq!(
            state.verify(&tampered).unwrap_err().status,
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_lobby_matching_by_bet() {
        let state = Arc::new(state(Duration::ZERO));
        let now = unix_timestamp();
        let start = |user: &str, bet: u64| {
            Json(signed(&state, json!({"username": user, "bet": bet}), now))
        };

        let opened = start_game(State(state.clone()), start("alice", 50))
            .await
            .unwrap_err();
        assert_eq!(opened.status, StatusCode::BAD_REQUEST);
        let lobby_id = opened.detail.as_str().unwrap().to_string();

        // Different bet opens a second lobby
        assert!(start_game(State(state.clone()), start("bob", 60)).await.is_err());
        assert_eq!(state.lobby_count(), 2);

        let Json(joined) = start_game(State(state.clone()), start("carol", 50))
            .await
            .unwrap();
        assert_eq!(joined, lobby_id);
        assert_eq!(state.lobby(&lobby_id).unwrap().players, vec!["alice", "carol"]);
    }

    #[tokio::test]
    async fn test_cancel_only_open_lobby_by_creator() {
        let state = Arc::new(state(Duration::ZERO));
        let now = unix_timestamp();
        state.lobbies.write().unwrap().push(Lobby {
            id: "wait42".to_string(),
            bet: 50,
            players: vec!["alice".to_string()],
            results: HashMap::new(),
        });

        let cancel =
            |user: &str| Json(signed(&state, json!({"username": user, "id": "wait42"}), now));

        let Json(by_other) = cancel_find(State(state.clone()), cancel("bob")).await.unwrap();
        assert!(!by_other);

        let Json(by_creator) = cancel_find(State(state.clone()), cancel("alice")).await.unwrap();
        assert!(by_creator);
        assert_eq!(state.lobby_count(), 0);
    }

    #[tokio::test]
    async fn test_balance_defaults() {
        let state = Arc::new(state(Duration::ZERO));
        state.set_balance("rich", 5000);

        let Json(fresh) = get_balance(State(state.clone()), Path("alice".to_string()))
            .await
            .unwrap();
        let Json(rich) = get_balance(State(state.clone()), Path("rich".to_string()))
            .await
            .unwrap();
        assert_eq!(fresh, 100);
        assert_eq!(rich, 5000);
    }
}
