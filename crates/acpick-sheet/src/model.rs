//! Observable view-state store.
//!
//! `SheetModel` is everything a renderer needs to paint the picker. The
//! runtime derives it from `SheetState` after each event and publishes it
//! through a `watch` channel; subscribers only wake up when the model
//! actually changed.

use std::str::FromStr;

use acpick_core::{Account, AccountId, DisplayData};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Mutually exclusive picker modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewState {
    NoAccounts,
    CollapsedList,
    ExpandedList,
    SigninInProgress,
    GeneralError,
    AuthError,
    ConfirmManagement,
}

impl ViewState {
    pub fn all() -> &'static [ViewState] {
        &[
            ViewState::NoAccounts,
            ViewState::CollapsedList,
            ViewState::ExpandedList,
            ViewState::SigninInProgress,
            ViewState::GeneralError,
            ViewState::AuthError,
            ViewState::ConfirmManagement,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewState::NoAccounts => "no-accounts",
            ViewState::CollapsedList => "collapsed-list",
            ViewState::ExpandedList => "expanded-list",
            ViewState::SigninInProgress => "signin-in-progress",
            ViewState::GeneralError => "general-error",
            ViewState::AuthError => "auth-error",
            ViewState::ConfirmManagement => "confirm-management",
        }
    }
}

impl FromStr for ViewState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('_', "-");
        ViewState::all()
            .iter()
            .copied()
            .find(|state| state.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| format!("unknown view state '{s}'"))
    }
}

/// One account row as the renderer shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountItem {
    pub id: AccountId,
    pub email: String,
    /// Profile name if the cache has one, else the directory's full name.
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub avatar: Option<String>,
}

impl AccountItem {
    pub fn new(account: &Account, profile: Option<&DisplayData>) -> Self {
        let name = profile
            .and_then(|p| p.name.clone())
            .or_else(|| account.full_name.clone());
        let avatar = profile
            .and_then(|p| p.avatar.clone())
            .or_else(|| account.avatar.clone());
        Self {
            id: account.id.clone(),
            email: account.email.clone(),
            name,
            given_name: account.given_name.clone(),
            avatar,
        }
    }

    /// Label for the "continue as" button.
    pub fn continue_label(&self) -> String {
        let who = self
            .given_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(&self.email);
        format!("Continue as {who}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetModel {
    pub view_state: ViewState,
    pub selected_account: Option<AccountItem>,
    pub accounts: Vec<AccountItem>,
    /// Domain of the managed account, only set while confirming management.
    pub managed_domain: Option<String>,
    /// False while a seamless sign-in runs without visible UI.
    pub revealed: bool,
}

/// Publishing side of the store. Owned by the runtime.
#[derive(Debug)]
pub struct ModelStore {
    tx: watch::Sender<SheetModel>,
}

impl ModelStore {
    pub fn new(initial: SheetModel) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<SheetModel> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> SheetModel {
        self.tx.borrow().clone()
    }

    /// Replaces the model. Returns true if subscribers were notified.
    pub fn publish(&self, model: SheetModel) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == model {
                false
            } else {
                *current = model;
                true
            }
        })
    }
}
