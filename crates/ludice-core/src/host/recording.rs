//! Recording host for testing.

use super::{Control, HostBridge, ThemeParams, UserIdentity};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One call made on the host
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostCall {
    Alert(String),
    ShowBackControl,
    HideBackControl,
    ShowStatus(String),
    HideStatus,
    SetControl(Control, bool),
}

/// Host double that records every call
#[derive(Clone, Default)]
pub struct RecordingHost {
    identity: Option<UserIdentity>,
    theme: ThemeParams,
    calls: Arc<Mutex<Vec<HostCall>>>,
}

impl RecordingHost {
    /// Host without a signed-in user
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: UserIdentity) -> Self {
        Self {
            identity: Some(identity),
            ..Self::default()
        }
    }

    pub fn with_theme(mut self, theme: ThemeParams) -> Self {
        self.theme = theme;
        self
    }

    fn calls_mut(&self) -> MutexGuard<'_, Vec<HostCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls_mut().clone()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.calls_mut()
            .iter()
            .filter_map(|c| match c {
                HostCall::Alert(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_alert(&self) -> Option<String> {
        self.alerts().pop()
    }

    /// Whether the status line is visible after all calls so far
    pub fn status_visible(&self) -> bool {
        self.calls_mut()
            .iter()
            .rev()
            .find_map(|c| match c {
                HostCall::ShowStatus(_) => Some(true),
                HostCall::HideStatus => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }

    /// Last status text shown, if any
    pub fn last_status(&self) -> Option<String> {
        self.calls_mut().iter().rev().find_map(|c| match c {
            HostCall::ShowStatus(text) => Some(text.clone()),
            _ => None,
        })
    }

    /// Whether the back control is visible after all calls so far
    pub fn back_visible(&self) -> bool {
        self.calls_mut()
            .iter()
            .rev()
            .find_map(|c| match c {
                HostCall::ShowBackControl => Some(true),
                HostCall::HideBackControl => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }

    /// Whether `control` is enabled after all calls so far (enabled by default)
    pub fn control_enabled(&self, control: Control) -> bool {
        self.calls_mut()
            .iter()
            .rev()
            .find_map(|c| match c {
                HostCall::SetControl(ctl, enabled) if *ctl == control => Some(*enabled),
                _ => None,
            })
            .unwrap_or(true)
    }

    pub fn clear(&self) {
        self.calls_mut().clear();
    }
}

impl HostBridge for RecordingHost {
    fn user_identity(&self) -> Option<UserIdentity> {
        self.identity.clone()
    }

    fn show_alert(&self, message: &str) {
        self.calls_mut().push(HostCall::Alert(message.to_string()));
    }

    fn show_back_control(&self) {
        self.calls_mut().push(HostCall::ShowBackControl);
    }

    fn hide_back_control(&self) {
        self.calls_mut().push(HostCall::HideBackControl);
    }

    fn theme(&self) -> ThemeParams {
        self.theme.clone()
    }

    fn show_status(&self, text: &str) {
        self.calls_mut().push(HostCall::ShowStatus(text.to_string()));
    }

    fn hide_status(&self) {
        self.calls_mut().push(HostCall::HideStatus);
    }

    fn set_control_enabled(&self, control: Control, enabled: bool) {
        self.calls_mut().push(HostCall::SetControl(control, enabled));
    }
}
