//! Host bridge for the web front end.
//!
//! The browser page cannot be called into, so everything the controller asks
//! of the host is queued here and handed out on the next session poll.

use ludice_core::host::{Control, HostBridge, ThemeParams, UserIdentity};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// What the page should currently show
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct HostView {
    pub back_visible: bool,
    pub status: Option<String>,
    pub controls: BTreeMap<String, bool>,
}

#[derive(Default)]
struct Inner {
    view: HostView,
    alerts: Vec<String>,
}

pub struct WebHost {
    identity: Option<UserIdentity>,
    theme: ThemeParams,
    inner: Mutex<Inner>,
}

fn control_key(control: Control) -> &'static str {
    match control {
        Control::FindOpponent => "find_opponent",
        Control::CancelSearch => "cancel_search",
        Control::RollDice => "roll_dice",
    }
}

impl WebHost {
    pub fn new(identity: Option<UserIdentity>, theme: ThemeParams) -> Self {
        let mut view = HostView::default();
        for control in [Control::FindOpponent, Control::CancelSearch, Control::RollDice] {
            view.controls.insert(control_key(control).to_string(), true);
        }

        Self {
            identity,
            theme,
            inner: Mutex::new(Inner {
                view,
                alerts: Vec::new(),
            }),
        }
    }

    /// Identity from `LUDICE_USER_ID` and `LUDICE_USER_NAME`
    pub fn identity_from_env() -> Option<UserIdentity> {
        let id = std::env::var("LUDICE_USER_ID").ok()?;
        let name = std::env::var("LUDICE_USER_NAME").unwrap_or_default();
        Some(UserIdentity::new(id, name))
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn view(&self) -> HostView {
        self.inner().view.clone()
    }

    /// Take every alert raised since the last call
    pub fn drain_alerts(&self) -> Vec<String> {
        std::mem::take(&mut self.inner().alerts)
    }
}

impl HostBridge for WebHost {
    fn user_identity(&self) -> Option<UserIdentity> {
        self.identity.clone()
    }

    fn show_alert(&self, message: &str) {
        self.inner().alerts.push(message.to_string());
    }

    fn show_back_control(&self) {
        self.inner().view.back_visible = true;
    }

    fn hide_back_control(&self) {
        self.inner().view.back_visible = false;
    }

    fn theme(&self) -> ThemeParams {
        self.theme.clone()
    }

    fn show_status(&self, text: &str) {
        self.inner().view.status = Some(text.to_string());
    }

    fn hide_status(&self) {
        self.inner().view.status = None;
    }

    fn set_control_enabled(&self, control: Control, enabled: bool) {
        self.inner()
            .view
            .controls
            .insert(control_key(control).to_string(), enabled);
    }
}
