//! Session controller: screens and the matchmaking state machine.
//!
//! ```text
//! idle --find_opponent--> matched        (200, opponent was waiting)
//! idle --find_opponent--> searching      (400, our lobby is open)
//! idle --find_opponent--> idle           (validation failure or error)
//! searching --poll--> matched | idle     (opponent joined | timeout)
//! searching --cancel_search / screen change--> idle
//! matched --screen change--> idle
//! ```

use super::error::SessionError;
use super::poller::{self, PollHandle};
use super::types::{MatchPhase, Profile, Screen, SessionState};
use crate::api::{ApiError, ApiResponse, LudiceApi};
use crate::config::LudiceConfig;
use crate::host::{Control, HostBridge, UserIdentity};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

const STATUS_SEARCHING: &str = "Searching for opponent...";
const STATUS_WAITING: &str = "⏳ Searching for opponent...";
pub(crate) const STATUS_FOUND: &str = "🎮 Opponent found! Starting game...";
const ALERT_GAME_STARTED: &str = "Game started! (Game play screen coming soon)";
const ALERT_CANCELLED: &str = "Search cancelled.";
const ALERT_CANCEL_REFUSED: &str = "Could not cancel search. The game may have already started.";
const ALERT_CANCEL_FAILED: &str = "Failed to cancel search. Please try again.";
const ALERT_ROLL_FAILED: &str = "Error submitting result.";
const ALERT_LOAD_FAILED: &str = "Failed to load user data. Please try again.";
const ALERT_TOP_UP: &str = "Payment integration coming soon!";
const ALERT_LEADERBOARD: &str = "Leaderboard coming soon!";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the controller and its poller task
pub(crate) struct Shared {
    pub(crate) config: Arc<LudiceConfig>,
    pub(crate) api: LudiceApi,
    pub(crate) host: Arc<dyn HostBridge>,
    pub(crate) user: UserIdentity,
    state: Mutex<SessionState>,
    balance: Mutex<u64>,
    in_flight: Mutex<HashSet<Control>>,
    /// Bumped on every screen change
    screen_epoch: AtomicU64,
}

impl Shared {
    pub(crate) fn state(&self) -> MutexGuard<'_, SessionState> {
        lock(&self.state)
    }

    pub(crate) fn is_searching_for(&self, game_id: &str) -> bool {
        self.state().is_searching_for(game_id)
    }

    /// Poll result: the opponent joined our lobby
    pub(crate) fn opponent_joined(&self, game_id: &str) -> bool {
        {
            let mut state = self.state();
            if !state.is_searching_for(game_id) {
                return false;
            }
            state.searching = false;
            state.active_game = true;
        }
        info!("Opponent joined game {}", game_id);
        self.host.show_status(STATUS_FOUND);
        true
    }

    /// Drop the search for `game_id` if it is still the current one
    pub(crate) fn abandon_search(&self, game_id: &str) -> bool {
        {
            let mut state = self.state();
            if !state.is_searching_for(game_id) {
                return false;
            }
            state.reset_match();
        }
        self.host.hide_status();
        true
    }

    fn begin(self: &Arc<Self>, control: Control) -> Result<InFlight, SessionError> {
        if !lock(&self.in_flight).insert(control) {
            return Err(SessionError::RequestInFlight);
        }
        self.host.set_control_enabled(control, false);
        Ok(InFlight {
            shared: Arc::clone(self),
            control,
        })
    }

    fn is_in_flight(&self, control: Control) -> bool {
        lock(&self.in_flight).contains(&control)
    }
}

/// Marks a control busy until dropped, then re-enables it
struct InFlight {
    shared: Arc<Shared>,
    control: Control,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        lock(&self.shared.in_flight).remove(&self.control);
        self.shared.host.set_control_enabled(self.control, true);
    }
}

/// Drives screens and matchmaking for one user session
pub struct SessionController {
    shared: Arc<Shared>,
    poller: Mutex<Option<PollHandle>>,
}

impl SessionController {
    /// Create a controller. The user identity is read from the host once.
    pub fn new(config: Arc<LudiceConfig>, api: LudiceApi, host: Arc<dyn HostBridge>) -> Self {
        let user = host.user_identity().unwrap_or_else(|| {
            warn!("No user data available, using placeholder identity");
            UserIdentity::placeholder()
        });
        let balance = config.initial_balance;

        Self {
            shared: Arc::new(Shared {
                config,
                api,
                host,
                user,
                state: Mutex::new(SessionState::default()),
                balance: Mutex::new(balance),
                in_flight: Mutex::new(HashSet::new()),
                screen_epoch: AtomicU64::new(0),
            }),
            poller: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.state().clone()
    }

    pub fn phase(&self) -> MatchPhase {
        self.shared.state().phase()
    }

    pub fn balance(&self) -> u64 {
        *lock(&self.shared.balance)
    }

    pub fn user(&self) -> &UserIdentity {
        &self.shared.user
    }

    pub fn config(&self) -> &LudiceConfig {
        &self.shared.config
    }

    /// Startup: load user data, hold the loading screen, then show the menu
    pub async fn boot(&self) {
        info!("Initializing Ludicé Mini App...");
        debug!(
            "Theme background: {}",
            self.shared.host.theme().background_color()
        );
        info!("User: {:?}", self.shared.user);

        if let Err(e) = self.refresh_balance().await {
            debug!("Continuing with balance {} after: {}", self.balance(), e);
        }

        tokio::time::sleep(self.shared.config.splash_delay).await;
        self.show_screen(Screen::MainMenu);
    }

    /// Make `screen` the active one.
    ///
    /// Leaving a screen stops polling and returns the session to idle,
    /// ending a running search or a matched game.
    pub fn show_screen(&self, screen: Screen) {
        debug!("Showing screen: {}", screen);

        let changed = {
            let mut state = self.shared.state();
            let changed = state.current_screen != screen;
            state.current_screen = screen;
            if changed {
                self.shared.screen_epoch.fetch_add(1, Ordering::SeqCst);
            }
            changed
        };

        if screen.is_root() {
            self.shared.host.hide_back_control();
        } else {
            self.shared.host.show_back_control();
        }

        if changed {
            self.stop_polling();
            let left = {
                let mut state = self.shared.state();
                let phase = state.phase();
                state.reset_match();
                phase
            };
            match left {
                MatchPhase::Idle => {}
                MatchPhase::Searching => {
                    info!("Opponent search abandoned on screen change");
                    self.shared.host.hide_status();
                }
                MatchPhase::Matched => {
                    info!("Game left on screen change");
                    self.shared.host.hide_status();
                }
            }
        }
    }

    /// Host back control pressed
    pub fn back(&self) {
        if self.shared.state().current_screen != Screen::MainMenu {
            self.show_screen(Screen::MainMenu);
        }
    }

    /// Check a bet against the configured limits and the balance
    pub fn validate_bet(&self, bet: u64) -> Result<(), SessionError> {
        let config = &self.shared.config;
        if bet == 0 || bet < config.min_bet {
            return Err(SessionError::BetTooLow {
                min: config.min_bet,
            });
        }
        if bet > config.max_bet {
            return Err(SessionError::BetTooHigh {
                max: config.max_bet,
            });
        }
        let balance = self.balance();
        if bet > balance {
            return Err(SessionError::InsufficientBalance { bet, balance });
        }
        Ok(())
    }

    /// Find an opponent for `bet`.
    ///
    /// Returns the phase the session settled in. Every failure is alerted
    /// through the host before it is returned.
    pub async fn find_opponent(&self, bet: u64) -> Result<MatchPhase, SessionError> {
        if self.shared.is_in_flight(Control::FindOpponent) {
            debug!("find_opponent ignored, previous request pending");
            return Err(SessionError::RequestInFlight);
        }

        let phase = self.phase();
        if phase != MatchPhase::Idle {
            warn!("find_opponent called while {:?}", phase);
            return Err(SessionError::NotIdle(phase));
        }

        if let Err(e) = self.validate_bet(bet) {
            self.shared.host.show_alert(&e.to_string());
            return Err(e);
        }

        let _busy = self.shared.begin(Control::FindOpponent)?;

        info!("Starting game with bet: {}", bet);
        self.shared.host.show_status(STATUS_SEARCHING);

        let epoch = self.shared.screen_epoch.load(Ordering::SeqCst);
        let result = self.shared.api.start_game(&self.shared.user.id, bet).await;

        if self.shared.screen_epoch.load(Ordering::SeqCst) != epoch {
            self.discard_start_response(result).await;
            return Ok(MatchPhase::Idle);
        }

        match self.apply_start_response(bet, result) {
            Ok(phase) => Ok(phase),
            Err(e) => {
                error!("Error finding opponent: {}", e);
                self.shared.state().reset_match();
                self.shared.host.hide_status();
                self.shared.host.show_alert(e.search_alert());
                Err(e)
            }
        }
    }

    /// The user left the screen while start-game was pending: drop the
    /// answer and close the lobby it may have opened for us
    async fn discard_start_response(&self, result: Result<ApiResponse, ApiError>) {
        self.shared.state().reset_match();
        self.shared.host.hide_status();

        let lobby = match &result {
            Ok(response) if response.status == 400 => response
                .data
                .detail()
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            _ => None,
        };
        let Some(game_id) = lobby else {
            info!("Screen changed during opponent search, response discarded");
            return;
        };

        info!("Screen changed during opponent search, closing lobby {}", game_id);
        match self
            .shared
            .api
            .cancel_search(&self.shared.user.id, &game_id)
            .await
        {
            Ok(response) if response.status == 200 => {}
            Ok(response) => warn!("Closing lobby {} answered {}", game_id, response.status),
            Err(e) => warn!("Closing lobby {} failed: {}", game_id, e),
        }
    }

    fn apply_start_response(
        &self,
        bet: u64,
        result: Result<ApiResponse, ApiError>,
    ) -> Result<MatchPhase, SessionError> {
        let response = result?;

        match response.status {
            200 => {
                let game_id = response.data.unquoted();
                if game_id.is_empty() {
                    return Err(SessionError::MalformedResponse(
                        "empty game id".to_string(),
                    ));
                }
                {
                    let mut state = self.shared.state();
                    state.game_id = Some(game_id.clone());
                    state.bet = bet;
                    state.active_game = true;
                    state.searching = false;
                }
                info!("Opponent found, game {}", game_id);
                self.shared.host.show_status(STATUS_FOUND);
                self.shared.host.show_alert(ALERT_GAME_STARTED);
                Ok(MatchPhase::Matched)
            }
            400 => {
                let game_id = response
                    .data
                    .detail()
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| {
                        SessionError::MalformedResponse("missing lobby id in detail".to_string())
                    })?
                    .to_string();
                {
                    let mut state = self.shared.state();
                    state.game_id = Some(game_id.clone());
                    state.bet = bet;
                    state.active_game = false;
                    state.searching = true;
                }
                info!("Waiting for opponent in lobby {}", game_id);
                self.shared.host.show_status(STATUS_WAITING);
                self.start_polling(game_id);
                Ok(MatchPhase::Searching)
            }
            status => Err(SessionError::UnexpectedStatus(status)),
        }
    }

    /// Cancel the running opponent search.
    ///
    /// The session returns to idle whatever the backend answers.
    pub async fn cancel_search(&self) -> Result<(), SessionError> {
        let game_id = {
            let state = self.shared.state();
            match (&state.game_id, state.searching) {
                (Some(id), true) => id.clone(),
                _ => return Err(SessionError::NotSearching),
            }
        };

        let _busy = self.shared.begin(Control::CancelSearch)?;
        self.stop_polling();

        let result = self
            .shared
            .api
            .cancel_search(&self.shared.user.id, &game_id)
            .await;

        self.shared.abandon_search(&game_id);

        match result {
            Ok(response) if response.status == 200 => {
                if response.data.as_bool() == Some(false) {
                    warn!("Cancel of {} refused, lobby no longer open", game_id);
                    self.shared.host.show_alert(ALERT_CANCEL_REFUSED);
                    return Err(SessionError::Refused);
                }
                info!("Search {} cancelled", game_id);
                self.shared.host.show_alert(ALERT_CANCELLED);
                Ok(())
            }
            Ok(response) => {
                warn!("Cancel of {} refused with {}", game_id, response.status);
                self.shared.host.show_alert(ALERT_CANCEL_REFUSED);
                Err(SessionError::UnexpectedStatus(response.status))
            }
            Err(e) => {
                error!("Error cancelling search {}: {}", game_id, e);
                self.shared.host.show_alert(ALERT_CANCEL_FAILED);
                Err(e.into())
            }
        }
    }

    /// Submit our dice roll for the active game
    pub async fn submit_roll(&self, value: u8) -> Result<(), SessionError> {
        if !(1..=6).contains(&value) {
            let e = SessionError::InvalidRoll(value);
            self.shared.host.show_alert(&e.to_string());
            return Err(e);
        }

        let game_id = {
            let state = self.shared.state();
            match (&state.game_id, state.active_game) {
                (Some(id), true) => id.clone(),
                _ => return Err(SessionError::NotInGame),
            }
        };

        let _busy = self.shared.begin(Control::RollDice)?;

        let result = self
            .shared
            .api
            .submit_result(&self.shared.user.id, &game_id, value)
            .await;

        match result {
            Ok(response) if response.status == 200 => {
                if response.data.as_bool() == Some(false) {
                    warn!("Roll for {} refused, not seated", game_id);
                    self.shared.host.show_alert(ALERT_ROLL_FAILED);
                    return Err(SessionError::Refused);
                }
                info!("Submitted roll {} for game {}", value, game_id);
                self.shared.host.show_alert(&format!(
                    "Your roll: {value}. Waiting for opponent's roll..."
                ));
                Ok(())
            }
            Ok(response) => {
                warn!("Roll for {} rejected with {}", game_id, response.status);
                self.shared.host.show_alert(ALERT_ROLL_FAILED);
                Err(SessionError::UnexpectedStatus(response.status))
            }
            Err(e) => {
                error!("Error submitting roll for {}: {}", game_id, e);
                self.shared.host.show_alert(ALERT_ROLL_FAILED);
                Err(e.into())
            }
        }
    }

    /// Load the balance from the backend, keeping the current one on failure
    pub async fn refresh_balance(&self) -> Result<u64, SessionError> {
        let result = match self.shared.api.fetch_balance(&self.shared.user.id).await {
            Ok(response) if response.status == 200 => response.data.as_u64().ok_or_else(|| {
                SessionError::MalformedResponse(format!("balance: {:?}", response.data))
            }),
            Ok(response) => Err(SessionError::UnexpectedStatus(response.status)),
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(balance) => {
                *lock(&self.shared.balance) = balance;
                info!("Balance: {}", balance);
                Ok(balance)
            }
            Err(e) => {
                error!("Failed to load user data: {}", e);
                self.shared.host.show_alert(ALERT_LOAD_FAILED);
                Err(e)
            }
        }
    }

    /// Show the profile screen
    pub fn show_profile(&self) -> Profile {
        self.show_screen(Screen::ProfileScreen);

        let display_name = if self.shared.user.display_name.is_empty() {
            "User".to_string()
        } else {
            self.shared.user.display_name.clone()
        };

        Profile {
            display_name,
            games: 0,
            wins: 0,
            win_rate: "0%".to_string(),
        }
    }

    pub fn top_up(&self) {
        self.shared.host.show_alert(ALERT_TOP_UP);
    }

    pub fn show_leaderboard(&self) {
        self.shared.host.show_alert(ALERT_LEADERBOARD);
    }

    fn start_polling(&self, game_id: String) {
        let handle = poller::spawn(Arc::clone(&self.shared), game_id);
        // Replacing an old handle aborts its task
        *lock(&self.poller) = Some(handle);
    }

    fn stop_polling(&self) {
        if let Some(handle) = lock(&self.poller).take() {
            debug!("Stopping opponent poll for {}", handle.game_id());
        }
    }
}
