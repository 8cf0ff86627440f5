//! Session types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Screens of the Mini App
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Screen {
    #[default]
    Loading,
    MainMenu,
    GameScreen,
    ProfileScreen,
}

impl Screen {
    pub fn as_str(&self) -> &'static str {
        match self {
            Screen::Loading => "loading",
            Screen::MainMenu => "main-menu",
            Screen::GameScreen => "game-screen",
            Screen::ProfileScreen => "profile-screen",
        }
    }

    /// The root screen has no back navigation
    pub fn is_root(&self) -> bool {
        *self == Screen::MainMenu
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Screen {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "loading" => Ok(Screen::Loading),
            "main-menu" => Ok(Screen::MainMenu),
            "game-screen" => Ok(Screen::GameScreen),
            "profile-screen" => Ok(Screen::ProfileScreen),
            other => Err(format!("unknown screen: {other}")),
        }
    }
}

/// Where the session stands in matchmaking
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    Idle,
    Searching,
    Matched,
}

/// Ephemeral UI/session state, never persisted
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub active_game: bool,
    pub game_id: Option<String>,
    pub bet: u64,
    pub searching: bool,
    pub current_screen: Screen,
}

impl SessionState {
    pub fn phase(&self) -> MatchPhase {
        if self.searching {
            MatchPhase::Searching
        } else if self.active_game {
            MatchPhase::Matched
        } else {
            MatchPhase::Idle
        }
    }

    /// True while searching under `game_id`
    pub fn is_searching_for(&self, game_id: &str) -> bool {
        self.searching && self.game_id.as_deref() == Some(game_id)
    }

    /// Drop all matchmaking data, keeping the current screen
    pub fn reset_match(&mut self) {
        self.active_game = false;
        self.game_id = None;
        self.bet = 0;
        self.searching = false;
    }
}

/// Profile screen contents. Stats are not served by the backend yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub display_name: String,
    pub games: u32,
    pub wins: u32,
    pub win_rate: String,
}
