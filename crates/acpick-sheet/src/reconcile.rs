//! Account-list reconciliation.
//!
//! Pure function from (current view, selection, new snapshot) to what the
//! reducer should do about it. The reducer applies the result; nothing here
//! touches state.

use acpick_core::Account;

use crate::model::ViewState;
use crate::state::Selection;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The directory has no accounts left.
    Emptied,
    /// A pending added account showed up and should be selected as if
    /// clicked.
    AddedAccountAppeared { account: Account, default: Account },
    /// New default and re-resolved selection. `view` is the view to be in
    /// afterwards.
    Refreshed {
        default: Account,
        selected: Option<Account>,
        view: ViewState,
    },
}

pub fn reconcile(view: ViewState, selection: &Selection, snapshot: &[Account]) -> Reconciliation {
    let Some(first) = snapshot.first() else {
        return Reconciliation::Emptied;
    };
    let default = first.clone();

    if let Some(email) = selection.pending_added_email.as_deref()
        && let Some(account) = Account::find_by_email(snapshot, email)
    {
        return Reconciliation::AddedAccountAppeared {
            account: account.clone(),
            default,
        };
    }

    // Re-resolve by email; the snapshot copy carries the fresh display fields.
    let selected = selection
        .selected
        .as_ref()
        .and_then(|selected| Account::find_by_email(snapshot, &selected.email))
        .cloned();

    match (view, selected) {
        (ViewState::NoAccounts, _) => Reconciliation::Refreshed {
            selected: Some(default.clone()),
            default,
            view: ViewState::CollapsedList,
        },
        (ViewState::CollapsedList, None) => Reconciliation::Refreshed {
            selected: Some(default.clone()),
            default,
            view: ViewState::CollapsedList,
        },
        (view, selected) => Reconciliation::Refreshed {
            default,
            selected,
            view,
        },
    }
}
