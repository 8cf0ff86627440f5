//! Integration tests for the matchmaking flow.
//!
//! These tests drive a SessionController against a scripted transport and a
//! recording host, checking both the session state and what the user sees.

use ludice_core::{
    api::{LudiceApi, Method, MockTransport},
    config::LudiceConfig,
    crypto::{Signer, SIGNATURE_FIELD},
    host::{Control, HostCall, RecordingHost, UserIdentity},
    session::{MatchPhase, Screen, SessionController, SessionError},
};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

fn setup(balance: u64) -> (Arc<SessionController>, MockTransport, RecordingHost) {
    let config = Arc::new(LudiceConfig {
        initial_balance: balance,
        poll_interval: Duration::from_secs(2),
        poll_max_time: Duration::from_secs(30),
        ..LudiceConfig::default()
    });
    let mock = MockTransport::new();
    let host = RecordingHost::with_identity(UserIdentity::new("alice", "Alice"));
    let api = LudiceApi::from_config(Arc::new(mock.clone()), &config).unwrap();
    let ctl = SessionController::new(config, api, Arc::new(host.clone()));
    (Arc::new(ctl), mock, host)
}

/// Bet below the minimum never reaches the network
#[tokio::test]
async fn test_bet_below_minimum() {
    let (ctl, mock, host) = setup(100);

    let err = ctl.find_opponent(5).await.unwrap_err();

    assert!(err.is_validation());
    assert_eq!(mock.request_count(), 0);
    assert_eq!(host.alerts(), vec!["Minimum bet is 10 ⭐".to_string()]);
    assert_eq!(ctl.phase(), MatchPhase::Idle);
    assert!(!host.status_visible());
}

#[tokio::test]
async fn test_bet_above_balance() {
    let (ctl, mock, host) = setup(10);

    let err = ctl.find_opponent(50).await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::InsufficientBalance { bet: 50, balance: 10 }
    ));
    assert_eq!(mock.request_count(), 0);
    assert_eq!(host.last_alert().as_deref(), Some("Insufficient balance!"));
}

/// Joining a waiting lobby matches immediately
#[tokio::test]
async fn test_join_existing_lobby() {
    let (ctl, mock, host) = setup(100);
    mock.respond(200, "\"abc123\"");

    let phase = ctl.find_opponent(50).await.unwrap();

    assert_eq!(phase, MatchPhase::Matched);
    let state = ctl.state();
    assert_eq!(state.game_id.as_deref(), Some("abc123"));
    assert_eq!(state.bet, 50);
    assert!(state.active_game);
    assert!(!state.searching);
    assert_eq!(
        host.last_status().as_deref(),
        Some("🎮 Opponent found! Starting game...")
    );
    assert_eq!(
        host.last_alert().as_deref(),
        Some("Game started! (Game play screen coming soon)")
    );

    // Signed body: username, bet, timestamp and a valid signature
    let request = &mock.requests()[0];
    assert_eq!(request.method, Method::Post);
    assert!(request.url.ends_with("/start/game"));
    let body = request.body.clone().unwrap();
    assert_eq!(body["username"], "alice");
    assert_eq!(body["bet"], 50);
    assert!(body["timestamp"].is_number());

    let mut fields: Map<String, Value> = body.as_object().unwrap().clone();
    let signature = fields.remove(SIGNATURE_FIELD).unwrap();
    let signer = Signer::new(&LudiceConfig::default().secret_key).unwrap();
    assert!(signer.verify(&fields, signature.as_str().unwrap()));
}

/// No lobby to join: ours is created and the poller starts
#[tokio::test(start_paused = true)]
async fn test_create_lobby_then_match() {
    let (ctl, mock, host) = setup(100);
    mock.respond(400, r#"{"detail":"wait42"}"#);
    mock.respond(200, "true");

    let phase = ctl.find_opponent(50).await.unwrap();

    assert_eq!(phase, MatchPhase::Searching);
    let state = ctl.state();
    assert_eq!(state.game_id.as_deref(), Some("wait42"));
    assert_eq!(state.bet, 50);
    assert!(state.searching);
    assert!(!state.active_game);
    assert_eq!(
        host.last_status().as_deref(),
        Some("⏳ Searching for opponent...")
    );

    tokio::time::sleep(Duration::from_millis(2100)).await;
    tokio::task::yield_now().await;

    assert_eq!(ctl.phase(), MatchPhase::Matched);
    let check = &mock.requests()[1];
    assert!(check.url.ends_with("/check/match"));
    let body = check.body.clone().unwrap();
    assert_eq!(body["username"], "alice");
    assert_eq!(body["id"], "wait42");
}

#[tokio::test]
async fn test_transport_failure_resets() {
    let (ctl, mock, host) = setup(100);
    mock.fail("connection refused");

    let err = ctl.find_opponent(50).await.unwrap_err();

    assert!(matches!(err, SessionError::Api(_)));
    let state = ctl.state();
    assert_eq!(state.phase(), MatchPhase::Idle);
    assert_eq!(state.game_id, None);
    assert_eq!(state.bet, 0);
    assert!(!host.status_visible());
    assert_eq!(
        host.last_alert().as_deref(),
        Some("Failed to find opponent. Please try again.")
    );
    assert!(host.control_enabled(Control::FindOpponent));
}

#[tokio::test]
async fn test_status_specific_alerts() {
    let (ctl, mock, host) = setup(100);
    mock.respond(403, r#"{"detail":"Invalid signature"}"#);
    mock.respond(429, r#"{"detail":"Too many requests"}"#);
    mock.respond(500, "Internal Server Error");

    for expected in [
        "Authentication failed. Please try again.",
        "Too many requests. Please wait a moment and try again.",
        "Failed to find opponent. Please try again.",
    ] {
        assert!(ctl.find_opponent(50).await.is_err());
        assert_eq!(host.last_alert().as_deref(), Some(expected));
        assert_eq!(ctl.phase(), MatchPhase::Idle);
    }
}

#[tokio::test]
async fn test_malformed_lobby_response() {
    let (ctl, mock, _host) = setup(100);
    mock.respond(400, r#"{"error":"nope"}"#);
    mock.respond(200, "\"\"");

    assert!(matches!(
        ctl.find_opponent(50).await,
        Err(SessionError::MalformedResponse(_))
    ));
    assert!(matches!(
        ctl.find_opponent(50).await,
        Err(SessionError::MalformedResponse(_))
    ));
    assert_eq!(ctl.phase(), MatchPhase::Idle);
}

/// A second find while the first is pending makes no call
#[tokio::test]
async fn test_find_is_not_reentrant() {
    let (ctl, mock, host) = setup(100);
    mock.respond(200, "\"abc123\"");
    mock.pause();

    let first = tokio::spawn({
        let ctl = Arc::clone(&ctl);
        async move { ctl.find_opponent(50).await }
    });
    while mock.request_count() == 0 {
        tokio::task::yield_now().await;
    }

    assert!(!host.control_enabled(Control::FindOpponent));
    assert!(matches!(
        ctl.find_opponent(50).await,
        Err(SessionError::RequestInFlight)
    ));
    assert_eq!(mock.request_count(), 1);

    mock.release();
    assert_eq!(first.await.unwrap().unwrap(), MatchPhase::Matched);
    assert!(host.control_enabled(Control::FindOpponent));
}

/// Leaving the screen while start-game is pending drops the answer and
/// closes the lobby it opened
#[tokio::test(start_paused = true)]
async fn test_screen_change_during_find_discards_lobby() {
    let (ctl, mock, host) = setup(100);
    ctl.show_screen(Screen::GameScreen);
    mock.respond(400, r#"{"detail":"wait42"}"#);
    mock.respond(200, "true");
    mock.pause();

    let find = tokio::spawn({
        let ctl = Arc::clone(&ctl);
        async move { ctl.find_opponent(50).await }
    });
    while mock.request_count() == 0 {
        tokio::task::yield_now().await;
    }

    ctl.show_screen(Screen::MainMenu);
    mock.release();
    assert_eq!(find.await.unwrap().unwrap(), MatchPhase::Idle);

    // No poll runs for the discarded lobby
    tokio::time::sleep(Duration::from_millis(4100)).await;
    tokio::task::yield_now().await;

    assert_eq!(ctl.phase(), MatchPhase::Idle);
    assert_eq!(ctl.state().game_id, None);
    assert!(!host.status_visible());
    assert!(host.control_enabled(Control::FindOpponent));

    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].url.ends_with("/cancel/find"));
    let body = requests[1].body.clone().unwrap();
    assert_eq!(body["username"], "alice");
    assert_eq!(body["id"], "wait42");
}

/// A finished game does not block the next search once the screen is left
#[tokio::test]
async fn test_find_again_after_leaving_game() {
    let (ctl, mock, host) = setup(100);
    mock.respond(200, "\"abc123\"");
    mock.respond(200, "\"def456\"");

    ctl.show_screen(Screen::GameScreen);
    assert_eq!(ctl.find_opponent(50).await.unwrap(), MatchPhase::Matched);

    ctl.show_screen(Screen::MainMenu);
    assert_eq!(ctl.phase(), MatchPhase::Idle);
    assert!(!host.status_visible());

    ctl.show_screen(Screen::GameScreen);
    assert_eq!(ctl.find_opponent(50).await.unwrap(), MatchPhase::Matched);
    assert_eq!(ctl.state().game_id.as_deref(), Some("def456"));
    assert_eq!(mock.request_count(), 2);
}

#[tokio::test]
async fn test_cancel_search() {
    let (ctl, mock, host) = setup(100);
    mock.respond(400, r#"{"detail":"wait42"}"#);
    mock.respond(200, "true");

    ctl.find_opponent(50).await.unwrap();
    ctl.cancel_search().await.unwrap();

    assert_eq!(ctl.phase(), MatchPhase::Idle);
    assert!(!host.status_visible());
    assert_eq!(host.last_alert().as_deref(), Some("Search cancelled."));

    let body = mock.requests()[1].body.clone().unwrap();
    assert_eq!(body["username"], "alice");
    assert_eq!(body["id"], "wait42");
}

#[tokio::test]
async fn test_cancel_refused_still_resets() {
    let (ctl, mock, host) = setup(100);
    mock.respond(400, r#"{"detail":"wait42"}"#);
    mock.respond(400, r#"{"detail":"Game can't be canceled"}"#);

    ctl.find_opponent(50).await.unwrap();
    assert!(ctl.cancel_search().await.is_err());

    assert_eq!(ctl.phase(), MatchPhase::Idle);
    assert_eq!(
        host.last_alert().as_deref(),
        Some("Could not cancel search. The game may have already started.")
    );
}

#[tokio::test]
async fn test_roll_after_match() {
    let (ctl, mock, host) = setup(100);
    mock.respond(200, "\"abc123\"");
    mock.respond(404, r#"{"detail":"Game not found"}"#);

    ctl.find_opponent(50).await.unwrap();
    assert!(ctl.submit_roll(5).await.is_err());

    assert_eq!(host.last_alert().as_deref(), Some("Error submitting result."));
    assert!(mock.requests()[1].url.ends_with("/write/res"));
}

#[tokio::test(start_paused = true)]
async fn test_boot_loads_balance_and_shows_menu() {
    let (ctl, mock, host) = setup(100);
    mock.respond(200, "75");

    ctl.boot().await;

    assert_eq!(ctl.balance(), 75);
    assert_eq!(ctl.state().current_screen, Screen::MainMenu);
    assert!(host
        .calls()
        .iter()
        .any(|c| *c == HostCall::HideBackControl));

    let request = &mock.requests()[0];
    assert_eq!(request.method, Method::Get);
    assert!(request.url.ends_with("/get/alice/balance"));
    assert_eq!(request.body, None);
}
