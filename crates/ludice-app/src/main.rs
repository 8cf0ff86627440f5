//! Ludicé Mini App Service
//!
//! HTTP service the Mini App page talks to. It owns one session controller and
//! exposes its operations as JSON endpoints.

mod host;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use host::{HostView, WebHost};
use ludice_core::{
    api::{LudiceApi, ReqwestTransport},
    config::LudiceConfig,
    host::{HostBridge, ThemeParams, UserIdentity},
    session::{MatchPhase, Profile, Screen, SessionController, SessionState},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Application error type
struct AppError(String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.0).into_response()
    }
}

/// App state
struct AppState {
    controller: SessionController,
    host: Arc<WebHost>,
}

impl AppState {
    fn new(config: Arc<LudiceConfig>, api: LudiceApi, host: Arc<WebHost>) -> Self {
        let controller = SessionController::new(config, api, host.clone());
        Self { controller, host }
    }

    fn view(&self) -> SessionView {
        let ctl = &self.controller;
        SessionView {
            state: ctl.state(),
            phase: ctl.phase(),
            balance: ctl.balance(),
            user: ctl.user().clone(),
            theme: self.host.theme(),
            host: self.host.view(),
            alerts: self.host.drain_alerts(),
        }
    }
}

// === Request/Response types ===

#[derive(Serialize)]
struct SessionView {
    state: SessionState,
    phase: MatchPhase,
    balance: u64,
    user: UserIdentity,
    theme: ThemeParams,
    host: HostView,
    alerts: Vec<String>,
}

#[derive(Serialize)]
struct ActionResponse {
    /// Set when the action failed; the user-facing text is in `alerts`
    error: Option<String>,
    #[serde(flatten)]
    session: SessionView,
}

impl ActionResponse {
    fn new<T, E: std::fmt::Display>(state: &AppState, result: Result<T, E>) -> Json<Self> {
        Json(Self {
            error: result.err().map(|e| e.to_string()),
            session: state.view(),
        })
    }
}

#[derive(Deserialize)]
struct ScreenRequest {
    screen: String,
}

#[derive(Deserialize)]
struct FindRequest {
    /// Bet as typed into the page
    #[serde(default)]
    bet: Value,
}

#[derive(Deserialize)]
struct RollRequest {
    value: u8,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

/// Read a bet the way the page's number input reports it: leading digits
/// count, anything else is 0. Digit strings past `u64::MAX` saturate
fn parse_bet(raw: &Value) -> u64 {
    match raw {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => {
            let digits: String = s
                .trim_start()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if digits.is_empty() {
                0
            } else {
                digits.parse().unwrap_or(u64::MAX)
            }
        }
        _ => 0,
    }
}

// === Route handlers ===

async fn get_session(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    Json(state.view())
}

async fn show_screen(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScreenRequest>,
) -> Result<Json<SessionView>, AppError> {
    let screen: Screen = req.screen.parse().map_err(AppError)?;
    state.controller.show_screen(screen);
    Ok(Json(state.view()))
}

async fn back(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    state.controller.back();
    Json(state.view())
}

async fn find_opponent(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FindRequest>,
) -> Json<ActionResponse> {
    let bet = parse_bet(&req.bet);
    let result = state.controller.find_opponent(bet).await;
    ActionResponse::new(&state, result)
}

async fn cancel_search(State(state): State<Arc<AppState>>) -> Json<ActionResponse> {
    let result = state.controller.cancel_search().await;
    ActionResponse::new(&state, result)
}

async fn roll(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RollRequest>,
) -> Json<ActionResponse> {
    let result = state.controller.submit_roll(req.value).await;
    ActionResponse::new(&state, result)
}

async fn get_profile(State(state): State<Arc<AppState>>) -> Json<Profile> {
    Json(state.controller.show_profile())
}

async fn top_up(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    state.controller.top_up();
    Json(state.view())
}

async fn leaderboard(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    state.controller.show_leaderboard();
    Json(state.view())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/session", get(get_session))
        .route("/api/screen", post(show_screen))
        .route("/api/back", post(back))
        .route("/api/find", post(find_opponent))
        .route("/api/cancel", post(cancel_search))
        .route("/api/roll", post(roll))
        .route("/api/profile", get(get_profile))
        .route("/api/topup", post(top_up))
        .route("/api/leaderboard", post(leaderboard))
        .route("/api/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn run(config: LudiceConfig) -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(config);
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);

    let api = LudiceApi::from_config(Arc::new(ReqwestTransport::new()), &config)?;
    let host = Arc::new(WebHost::new(
        WebHost::identity_from_env(),
        ThemeParams::default(),
    ));
    let state = Arc::new(AppState::new(config.clone(), api, host));

    info!("Backend: {}", config.api_base_url);

    let booting = state.clone();
    tokio::spawn(async move {
        booting.controller.boot().await;
    });

    let app = create_router(state);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Mini App service listening on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let config = LudiceConfig::from_env();

    // Initialize tracing
    let default_filter = config
        .as_ref()
        .map(LudiceConfig::log_filter)
        .unwrap_or("info");
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
    }

    let result = match config {
        Ok(config) => run(config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        error!("Mini App service failed: {}", e);
        std::process::exit(1);
    }
}
