//! Outward-facing handles.
//!
//! `SheetHandle` is the UI action surface; `SigninStateController` is what
//! the delegate gets on completion. Both only send events to the runtime
//! inbox, so neither can touch sheet state directly.

use acpick_core::Account;
use acpick_core::collaborators::SigninController;
use tokio::sync::oneshot;

use crate::error::SheetError;
use crate::events::SheetEvent;
use crate::runtime::{Presence, SheetEventSender};

/// UI action surface. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SheetHandle {
    inbox: SheetEventSender,
    _presence: Option<Presence>,
}

impl SheetHandle {
    pub(crate) fn new(inbox: SheetEventSender, presence: Option<Presence>) -> Self {
        Self {
            inbox,
            _presence: presence,
        }
    }

    fn send(&self, event: SheetEvent) -> Result<(), SheetError> {
        self.inbox
            .send(event)
            .map_err(|_closed| SheetError::Closed)
    }

    pub fn select_account(&self, account: Account) -> Result<(), SheetError> {
        self.send(SheetEvent::AccountSelected(account))
    }

    /// Click on the selected account in the collapsed list.
    pub fn expand_account_list(&self) -> Result<(), SheetError> {
        self.send(SheetEvent::SelectedAccountClicked)
    }

    pub fn continue_clicked(&self) -> Result<(), SheetError> {
        self.send(SheetEvent::ContinueClicked)
    }

    /// Returns whether the sheet consumed the back press.
    pub async fn back_pressed(&self) -> Result<bool, SheetError> {
        let (reply, answer) = oneshot::channel();
        self.send(SheetEvent::BackPressed { reply: Some(reply) })?;
        answer.await.map_err(|_dropped| SheetError::Closed)
    }

    pub fn add_account(&self) -> Result<(), SheetError> {
        self.send(SheetEvent::AddAccountClicked)
    }

    pub fn dismiss(&self) -> Result<(), SheetError> {
        self.send(SheetEvent::Dismissed)
    }
}

/// Handed to `SigninDelegate::on_signin_complete`.
#[derive(Debug, Clone)]
pub struct SigninStateController {
    inbox: SheetEventSender,
    _presence: Option<Presence>,
}

impl SigninStateController {
    pub(crate) fn new(inbox: SheetEventSender, presence: Option<Presence>) -> Self {
        Self {
            inbox,
            _presence: presence,
        }
    }

    fn send(&self, event: SheetEvent) {
        if self.inbox.send(event).is_err() {
            tracing::debug!("sheet closed, dropping delegate error callback");
        }
    }
}

impl SigninController for SigninStateController {
    fn show_general_error(&self) {
        self.send(SheetEvent::ShowGeneralError);
    }

    fn show_auth_error(&self) {
        self.send(SheetEvent::ShowAuthError);
    }
}
