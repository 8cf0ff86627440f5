//! Host environment abstraction.
//!
//! The Mini App runs inside a chat client that provides identity, theme colours,
//! alerts and a back-navigation control. The session controller only sees that
//! environment through [`HostBridge`].

mod recording;

pub use recording::{HostCall, RecordingHost};

use serde::{Deserialize, Serialize};

/// The signed-in user as reported by the host
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub display_name: String,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }

    /// Identity used when the host provides none
    pub fn placeholder() -> Self {
        Self::new("test_user", "Test User")
    }
}

/// Host theme colours, each optional
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeParams {
    pub bg_color: Option<String>,
    pub text_color: Option<String>,
    pub hint_color: Option<String>,
    pub link_color: Option<String>,
    pub button_color: Option<String>,
    pub button_text_color: Option<String>,
    pub secondary_bg_color: Option<String>,
}

impl ThemeParams {
    pub fn background_color(&self) -> &str {
        self.bg_color.as_deref().unwrap_or("#ffffff")
    }
}

/// User controls the controller may disable while a request is pending
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    FindOpponent,
    CancelSearch,
    RollDice,
}

/// Capabilities the host environment offers the session controller
pub trait HostBridge: Send + Sync {
    /// Signed-in user, if the host knows one
    fn user_identity(&self) -> Option<UserIdentity>;

    /// Blocking user-visible alert
    fn show_alert(&self, message: &str);

    fn show_back_control(&self);

    fn hide_back_control(&self);

    fn theme(&self) -> ThemeParams;

    /// Show the matchmaking status line with `text`
    fn show_status(&self, text: &str);

    /// Hide the matchmaking status line
    fn hide_status(&self);

    fn set_control_enabled(&self, control: Control, enabled: bool);
}
