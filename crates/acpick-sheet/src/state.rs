//! Sheet state.
//!
//! ```text
//! SheetState
//! ├── view / initial_view        (current and launch ViewState)
//! ├── accounts + profiles        (latest directory snapshot, display data)
//! ├── selection: Selection       (selected / default / added / pending email)
//! ├── accepted_management        (sticky "user confirmed management")
//! ├── task_seq + tasks           (async task ids, stale-result filtering)
//! └── options: SheetOptions      (device gate, delegate add-account)
//! ```
//!
//! Only the reducer in `update.rs` mutates this. The renderer sees it through
//! `SheetState::model`.

use std::collections::HashMap;

use acpick_core::{Account, AccountId, DisplayData, LaunchMode, NonEmptyAccounts};

use crate::common::{TaskId, TaskKind, TaskSeq, Tasks};
use crate::error::SheetError;
use crate::model::{AccountItem, SheetModel, ViewState};

/// Interactive launch variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractiveMode {
    Default,
    ChooseAccount,
}

/// Resolved launch request.
///
/// Seamless sign-in carries a `NonEmptyAccounts` snapshot, so an empty
/// directory cannot reach the seamless state machine at all.
#[derive(Debug, Clone)]
pub enum Launch {
    Interactive {
        mode: InteractiveMode,
        accounts: Vec<Account>,
        preferred: Option<AccountId>,
    },
    Seamless {
        accounts: NonEmptyAccounts,
        target: AccountId,
    },
}

impl Launch {
    /// Builds a launch from a configured mode.
    ///
    /// For interactive modes `account` is the preferred selection; for
    /// seamless it is the mandatory sign-in target.
    pub fn from_mode(
        mode: LaunchMode,
        accounts: Vec<Account>,
        account: Option<AccountId>,
    ) -> Result<Self, SheetError> {
        match mode {
            LaunchMode::Default => Ok(Launch::Interactive {
                mode: InteractiveMode::Default,
                accounts,
                preferred: account,
            }),
            LaunchMode::ChooseAccount => Ok(Launch::Interactive {
                mode: InteractiveMode::ChooseAccount,
                accounts,
                preferred: account,
            }),
            LaunchMode::Seamless => {
                let target = account.ok_or(SheetError::MissingTarget)?;
                let accounts = NonEmptyAccounts::new(accounts).ok_or(SheetError::EmptyDirectory)?;
                Ok(Launch::Seamless { accounts, target })
            }
        }
    }
}

/// Capabilities read from collaborators once, at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct SheetOptions {
    pub requires_device_unlock: bool,
    pub delegate_handles_add_account: bool,
}

/// Which account the user is about to sign in with, and why.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub selected: Option<Account>,
    /// First account of the latest snapshot (or the preferred one at launch).
    pub default: Option<Account>,
    /// Account the user added during this invocation.
    pub added: Option<Account>,
    /// Email of an added account not yet visible in the directory.
    pub pending_added_email: Option<String>,
}

impl Selection {
    pub fn is_selected(&self, account: &Account) -> bool {
        self.selected
            .as_ref()
            .is_some_and(|selected| selected.same_account(account))
    }
}

#[derive(Debug)]
pub struct SheetState {
    pub seamless: bool,
    pub initial_view: ViewState,
    pub view: ViewState,
    pub accounts: Vec<Account>,
    pub profiles: HashMap<AccountId, DisplayData>,
    pub selection: Selection,
    pub accepted_management: bool,
    pub managed_domain: Option<String>,
    pub revealed: bool,
    pub signed_in: Option<Account>,
    pub finished: bool,
    pub options: SheetOptions,
    pub task_seq: TaskSeq,
    pub tasks: Tasks,
}

impl SheetState {
    pub fn new(
        launch: Launch,
        profiles: HashMap<AccountId, DisplayData>,
        options: SheetOptions,
    ) -> Result<Self, SheetError> {
        let (seamless, view, accounts, selection) = match launch {
            Launch::Interactive {
                mode,
                accounts,
                preferred,
            } => {
                let default = preferred
                    .as_ref()
                    .and_then(|id| Account::find_by_id(&accounts, id))
                    .or_else(|| accounts.first())
                    .cloned();
                let view = match (&default, mode) {
                    (None, _) => ViewState::NoAccounts,
                    (Some(_), InteractiveMode::Default) => ViewState::CollapsedList,
                    (Some(_), InteractiveMode::ChooseAccount) => ViewState::ExpandedList,
                };
                let selection = Selection {
                    selected: default.clone(),
                    default,
                    ..Selection::default()
                };
                (false, view, accounts, selection)
            }
            Launch::Seamless { accounts, target } => {
                let selected = accounts
                    .find(&target)
                    .cloned()
                    .ok_or(SheetError::TargetNotFound(target))?;
                let selection = Selection {
                    selected: Some(selected),
                    default: Some(accounts.first().clone()),
                    ..Selection::default()
                };
                (
                    true,
                    ViewState::SigninInProgress,
                    accounts.into_vec(),
                    selection,
                )
            }
        };

        Ok(Self {
            seamless,
            initial_view: view,
            view,
            accounts,
            profiles,
            selection,
            accepted_management: false,
            managed_domain: None,
            revealed: !seamless,
            signed_in: None,
            finished: false,
            options,
            task_seq: TaskSeq::default(),
            tasks: Tasks::default(),
        })
    }

    /// Issues a task id and marks it as the active one for `kind`.
    pub fn begin_task(&mut self, kind: TaskKind) -> TaskId {
        let id = self.task_seq.next_id();
        self.tasks.state_mut(kind).start(id);
        id
    }

    fn item(&self, account: &Account) -> AccountItem {
        AccountItem::new(account, self.profiles.get(&account.id))
    }

    /// Snapshot for the renderer.
    pub fn model(&self) -> SheetModel {
        SheetModel {
            view_state: self.view,
            selected_account: self.selection.selected.as_ref().map(|a| self.item(a)),
            accounts: self.accounts.iter().map(|a| self.item(a)).collect(),
            managed_domain: self.managed_domain.clone(),
            revealed: self.revealed,
        }
    }
}
