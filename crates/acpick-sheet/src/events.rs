//! Sheet event types.
//!
//! Every input the orchestrator reacts to is a `SheetEvent`: UI actions from
//! `SheetHandle`, directory and profile notifications from the subscription
//! forwarders, delegate callbacks through `SigninStateController`, and the
//! results of async collaborator calls.
//!
//! ## Inbox Pattern
//!
//! Producers send events to the runtime's inbox. The runtime feeds them to
//! the reducer one at a time, so all state changes happen on one task.
//!
//! ## Task Results
//!
//! Collaborator calls run as spawned tasks and come back as
//! `SheetEvent::TaskCompleted`. Each result carries the account the call was
//! issued for, so the reducer can drop results that no longer match the
//! live selection.

use std::collections::HashMap;

use acpick_core::collaborators::SigninOutcome;
use acpick_core::{Account, AccountId, DisplayData};
use tokio::sync::oneshot;

use crate::common::{TaskCompleted, TaskKind};

#[derive(Debug)]
pub enum SheetEvent {
    /// User picked an account from the list.
    AccountSelected(Account),

    /// User clicked the selected account in the collapsed list.
    SelectedAccountClicked,

    /// Primary button ("continue as", "try again", "add account", ...).
    ContinueClicked,

    /// Back navigation. The reply says whether the press was consumed.
    BackPressed {
        reply: Option<oneshot::Sender<bool>>,
    },

    AddAccountClicked,

    /// The surrounding UI shell closed the sheet.
    Dismissed,

    /// The account directory changed. Carries the fresh snapshot and the
    /// display data for each account in it.
    AccountsChanged {
        accounts: Vec<Account>,
        profiles: HashMap<AccountId, DisplayData>,
    },

    /// Display data for one account changed.
    ProfileChanged { id: AccountId, data: DisplayData },

    /// Delegate surfaced a failure after completion.
    ShowGeneralError,

    /// Delegate surfaced a credential problem after completion.
    ShowAuthError,

    TaskCompleted {
        kind: TaskKind,
        completed: TaskCompleted<TaskResult>,
    },
}

/// Results of collaborator calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    DeviceUnlock {
        account: Account,
        unlocked: bool,
    },
    ManagementChecked {
        account: Account,
        managed: bool,
        /// Only resolved for managed accounts.
        domain: Option<String>,
    },
    Signin {
        account: Account,
        outcome: SigninOutcome,
    },
    CredentialsRefreshed {
        account: Account,
        success: bool,
    },
    /// `None` when the user backed out of the system flow.
    AccountAdded {
        email: Option<String>,
    },
}

impl TaskResult {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskResult::DeviceUnlock { .. } => TaskKind::DeviceUnlock,
            TaskResult::ManagementChecked { .. } => TaskKind::ManagementCheck,
            TaskResult::Signin { .. } => TaskKind::Signin,
            TaskResult::CredentialsRefreshed { .. } => TaskKind::CredentialRefresh,
            TaskResult::AccountAdded { .. } => TaskKind::AddAccount,
        }
    }
}
