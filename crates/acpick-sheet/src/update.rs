//! Sheet reducer (update function).
//!
//! All state mutations happen here. The runtime calls `start` once and then
//! `update(state, event)` for every inbox event, executing the returned
//! effects.
//!
//! Collaborator results are only applied while their task is the active one
//! for its kind and the account they were issued for is still the selected
//! account. Anything else is a late result from a superseded attempt.

use acpick_core::Account;
use acpick_core::collaborators::SigninOutcome;
use acpick_core::telemetry::PromoAction;
use tracing::{debug, error, warn};

use crate::common::{TaskCompleted, TaskKind, Tasks};
use crate::effects::SheetEffect;
use crate::events::{SheetEvent, TaskResult};
use crate::model::ViewState;
use crate::reconcile::{Reconciliation, reconcile};
use crate::state::SheetState;

/// Effects to run right after construction.
///
/// Seamless sign-in starts signing in immediately; interactive launches only
/// report that the sheet was shown.
pub fn start(state: &mut SheetState) -> Vec<SheetEffect> {
    let mut effects = Vec::new();
    if state.seamless {
        sign_in(state, &mut effects);
    } else if state.view == ViewState::NoAccounts {
        effects.push(SheetEffect::Record(PromoAction::ShownWithNoAccounts));
    } else {
        effects.push(SheetEffect::Record(PromoAction::Shown));
    }
    effects
}

/// The main reducer function.
pub fn update(state: &mut SheetState, event: SheetEvent) -> Vec<SheetEffect> {
    let mut effects = Vec::new();
    if state.finished {
        debug!(?event, "sheet finished, dropping event");
        return effects;
    }

    match event {
        SheetEvent::AccountSelected(account) => select_account(state, account, &mut effects),
        SheetEvent::SelectedAccountClicked => expand_account_list(state),
        SheetEvent::ContinueClicked => on_continue(state, &mut effects),
        SheetEvent::BackPressed { reply } => {
            let consumed = back_pressed(state, &mut effects);
            if let Some(reply) = reply {
                effects.push(SheetEffect::AnswerBack { reply, consumed });
            }
        }
        SheetEvent::AddAccountClicked => add_account(state, &mut effects),
        SheetEvent::Dismissed => dismiss(state, Some(PromoAction::DismissedButton), &mut effects),
        SheetEvent::AccountsChanged { accounts, profiles } => {
            state.accounts = accounts;
            state.profiles = profiles;
            on_accounts_changed(state, &mut effects);
        }
        SheetEvent::ProfileChanged { id, data } => {
            state.profiles.insert(id, data);
        }
        SheetEvent::ShowGeneralError => show_general_error(state, &mut effects),
        SheetEvent::ShowAuthError => show_auth_error(state, &mut effects),
        SheetEvent::TaskCompleted { kind, completed } => {
            on_task_completed(state, kind, completed, &mut effects);
        }
    }
    effects
}

// ============================================================================
// Selection and sign-in sequence
// ============================================================================

fn select_account(state: &mut SheetState, account: Account, effects: &mut Vec<SheetEffect>) {
    if state.seamless {
        error!(account = %account.id, "account selection is not supported in seamless sign-in");
        return;
    }
    if state
        .selection
        .pending_added_email
        .as_deref()
        .is_some_and(|email| !email.eq_ignore_ascii_case(&account.email))
    {
        state.selection.pending_added_email = None;
    }
    debug!(account = %account.id, "account selected");
    state.selection.selected = Some(account);
    run_device_gate(state, effects);
}

fn expand_account_list(state: &mut SheetState) {
    if state.view == ViewState::CollapsedList {
        set_view(state, ViewState::ExpandedList);
    } else {
        debug!(view = state.view.as_str(), "expand ignored outside the collapsed list");
    }
}

fn run_device_gate(state: &mut SheetState, effects: &mut Vec<SheetEffect>) {
    if !state.options.requires_device_unlock {
        sign_in(state, effects);
        return;
    }
    let Some(account) = state.selection.selected.clone() else {
        selection_vanished(state, effects);
        return;
    };
    let task = state.begin_task(TaskKind::DeviceUnlock);
    effects.push(SheetEffect::RequestDeviceUnlock { task, account });
}

fn sign_in(state: &mut SheetState, effects: &mut Vec<SheetEffect>) {
    let Some(account) = state.selection.selected.clone() else {
        selection_vanished(state, effects);
        return;
    };
    // A new attempt supersedes whatever the previous one still has in flight.
    state.tasks.signin.clear();
    effects.push(SheetEffect::StartSigninTimer);
    set_view(state, ViewState::SigninInProgress);
    let task = state.begin_task(TaskKind::ManagementCheck);
    effects.push(SheetEffect::CheckManagement { task, account });
}

fn sign_in_after_management_check(state: &mut SheetState, effects: &mut Vec<SheetEffect>) {
    let Some(account) = state.selection.selected.clone() else {
        selection_vanished(state, effects);
        return;
    };
    if state.accepted_management {
        effects.push(SheetEffect::SetManagementAccepted { accepted: true });
    }
    set_view(state, ViewState::SigninInProgress);

    let action = if state
        .selection
        .added
        .as_ref()
        .is_some_and(|added| added.same_account(&account))
    {
        PromoAction::SignedInWithAddedAccount
    } else if state
        .selection
        .default
        .as_ref()
        .is_some_and(|default| default.same_account(&account))
    {
        PromoAction::SignedInWithDefaultAccount
    } else {
        PromoAction::SignedInWithNonDefaultAccount
    };
    effects.push(SheetEffect::Record(action));

    let task = state.begin_task(TaskKind::Signin);
    effects.push(SheetEffect::SignIn { task, account });
}

// ============================================================================
// View-driven transitions
// ============================================================================

fn on_continue(state: &mut SheetState, effects: &mut Vec<SheetEffect>) {
    match state.view {
        ViewState::CollapsedList => {
            if state.seamless {
                error!("continue from the collapsed list is not supported in seamless sign-in");
                return;
            }
            run_device_gate(state, effects);
        }
        ViewState::GeneralError => {
            if state.accepted_management {
                effects.push(SheetEffect::StartSigninTimer);
                sign_in_after_management_check(state, effects);
            } else {
                run_device_gate(state, effects);
            }
        }
        ViewState::NoAccounts => add_account(state, effects),
        ViewState::AuthError => {
            let Some(account) = state.selection.selected.clone() else {
                selection_vanished(state, effects);
                return;
            };
            let task = state.begin_task(TaskKind::CredentialRefresh);
            effects.push(SheetEffect::RefreshCredentials { task, account });
        }
        ViewState::ConfirmManagement => {
            state.accepted_management = true;
            effects.push(SheetEffect::Record(PromoAction::ConfirmManagementAccepted));
            sign_in_after_management_check(state, effects);
        }
        ViewState::ExpandedList | ViewState::SigninInProgress => {
            debug!(view = state.view.as_str(), "continue ignored");
        }
    }
}

/// Returns whether the press was consumed.
fn back_pressed(state: &mut SheetState, effects: &mut Vec<SheetEffect>) -> bool {
    if state.seamless {
        dismiss(state, Some(PromoAction::DismissedBack), effects);
        return false;
    }

    let consumed = match state.view {
        ViewState::ExpandedList => state.initial_view != ViewState::ExpandedList,
        ViewState::ConfirmManagement | ViewState::GeneralError | ViewState::AuthError => true,
        ViewState::NoAccounts | ViewState::CollapsedList | ViewState::SigninInProgress => false,
    };
    if !consumed {
        return false;
    }

    state.tasks.device_unlock.clear();
    state.tasks.credential_refresh.clear();

    let mut target = state.initial_view;
    if target == ViewState::NoAccounts && !state.accounts.is_empty() {
        target = ViewState::CollapsedList;
    }
    if target == ViewState::CollapsedList && state.selection.selected.is_none() {
        state.selection.selected = state.selection.default.clone();
        if state.selection.selected.is_none() {
            target = ViewState::NoAccounts;
        }
    }
    set_view(state, target);
    true
}

fn add_account(state: &mut SheetState, effects: &mut Vec<SheetEffect>) {
    if state.seamless {
        error!("add account is not supported in seamless sign-in");
        return;
    }
    effects.push(SheetEffect::Record(PromoAction::AddAccountStarted));
    if state.options.delegate_handles_add_account {
        effects.push(SheetEffect::DelegateAddAccount);
        return;
    }
    let task = state.begin_task(TaskKind::AddAccount);
    effects.push(SheetEffect::RequestAddAccount { task });
}

fn account_added(state: &mut SheetState, email: String, effects: &mut Vec<SheetEffect>) {
    effects.push(SheetEffect::Record(PromoAction::AddAccountCompleted));
    match Account::find_by_email(&state.accounts, &email).cloned() {
        Some(account) => {
            state.selection.pending_added_email = None;
            state.selection.added = Some(account.clone());
            select_account(state, account, effects);
        }
        None => {
            debug!(%email, "added account not in the directory yet");
            state.selection.pending_added_email = Some(email);
        }
    }
}

// ============================================================================
// Error surfaces
// ============================================================================

fn show_general_error(state: &mut SheetState, effects: &mut Vec<SheetEffect>) {
    if state.accepted_management {
        effects.push(SheetEffect::SetManagementAccepted { accepted: false });
    }
    set_view(state, ViewState::GeneralError);
    effects.push(SheetEffect::Record(PromoAction::GenericErrorShown));
    reveal(state, effects);
}

fn show_auth_error(state: &mut SheetState, effects: &mut Vec<SheetEffect>) {
    if state.seamless {
        error!("auth error surface is not supported in seamless sign-in");
        return;
    }
    if state.accepted_management {
        effects.push(SheetEffect::SetManagementAccepted { accepted: false });
        state.accepted_management = false;
    }
    set_view(state, ViewState::AuthError);
    effects.push(SheetEffect::Record(PromoAction::AuthErrorShown));
}

fn selection_vanished(state: &mut SheetState, effects: &mut Vec<SheetEffect>) {
    if state.seamless {
        error!("selected account vanished during seamless sign-in");
        dismiss(state, None, effects);
        return;
    }
    warn!("selected account vanished before sign-in");
    set_view(state, ViewState::GeneralError);
    effects.push(SheetEffect::Record(PromoAction::GenericErrorShown));
}

// ============================================================================
// Directory changes
// ============================================================================

fn on_accounts_changed(state: &mut SheetState, effects: &mut Vec<SheetEffect>) {
    match reconcile(state.view, &state.selection, &state.accounts) {
        Reconciliation::Emptied => {
            if state.seamless {
                error!("account directory emptied during seamless sign-in");
                dismiss(state, None, effects);
                return;
            }
            state.selection.selected = None;
            state.selection.default = None;
            state.profiles.clear();
            // Steps bound to the vanished selection are void. A running
            // sign-in still reports, and a running add-account flow may be
            // what brings the next account in.
            state.tasks.device_unlock.clear();
            state.tasks.management_check.clear();
            state.tasks.credential_refresh.clear();
            set_view(state, ViewState::NoAccounts);
        }
        Reconciliation::AddedAccountAppeared { account, default } => {
            state.selection.default = Some(default);
            state.selection.pending_added_email = None;
            state.selection.added = Some(account.clone());
            select_account(state, account, effects);
        }
        Reconciliation::Refreshed {
            default,
            selected,
            view,
        } => {
            if state.seamless && selected.is_none() {
                error!("seamless sign-in target left the account directory");
                dismiss(state, None, effects);
                return;
            }
            state.selection.default = Some(default);
            state.selection.selected = selected;
            set_view(state, view);
        }
    }
}

// ============================================================================
// Task results
// ============================================================================

/// Outcome of matching a result's account against the live selection.
enum Binding {
    Live,
    Vanished,
    Stale,
}

fn binding(state: &SheetState, account: &Account) -> Binding {
    if state.selection.selected.is_none() {
        Binding::Vanished
    } else if state.selection.is_selected(account) {
        Binding::Live
    } else {
        Binding::Stale
    }
}

fn on_task_completed(
    state: &mut SheetState,
    kind: TaskKind,
    completed: TaskCompleted<TaskResult>,
    effects: &mut Vec<SheetEffect>,
) {
    let TaskCompleted { id, result } = completed;
    if !state.tasks.state_mut(kind).finish_if_active(id) {
        debug!(?kind, task = id.0, "dropping stale task result");
        return;
    }

    match result {
        TaskResult::DeviceUnlock { account, unlocked } => match binding(state, &account) {
            Binding::Stale => debug!(account = %account.id, "device unlock for a previous selection"),
            Binding::Vanished => selection_vanished(state, effects),
            Binding::Live if unlocked => sign_in(state, effects),
            Binding::Live => debug!(account = %account.id, "device unlock cancelled"),
        },
        TaskResult::ManagementChecked {
            account,
            managed,
            domain,
        } => match binding(state, &account) {
            Binding::Stale => {
                debug!(account = %account.id, "management check for a previous selection");
            }
            Binding::Vanished => selection_vanished(state, effects),
            Binding::Live if managed => {
                set_view(state, ViewState::ConfirmManagement);
                state.managed_domain = domain;
                effects.push(SheetEffect::Record(PromoAction::ConfirmManagementShown));
                reveal(state, effects);
            }
            Binding::Live => sign_in_after_management_check(state, effects),
        },
        TaskResult::Signin { account, outcome } => {
            // A vanished selection still gets its result: the sign-in itself
            // already happened.
            if matches!(binding(state, &account), Binding::Stale) {
                debug!(account = %account.id, "sign-in result for a previous selection");
                return;
            }
            match outcome {
                SigninOutcome::Completed => {
                    state.signed_in = Some(account.clone());
                    effects.push(SheetEffect::NotifySigninComplete { account });
                }
                SigninOutcome::Aborted => {
                    warn!(account = %account.id, "sign-in aborted");
                    show_general_error(state, effects);
                }
            }
        }
        TaskResult::CredentialsRefreshed { account, success } => match binding(state, &account) {
            Binding::Live if success => set_view(state, ViewState::CollapsedList),
            Binding::Live => warn!(account = %account.id, "credential refresh failed"),
            Binding::Stale | Binding::Vanished => {
                debug!(account = %account.id, "credential refresh for a previous selection");
            }
        },
        TaskResult::AccountAdded { email } => match email {
            Some(email) => account_added(state, email, effects),
            None => debug!("add account cancelled"),
        },
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn set_view(state: &mut SheetState, view: ViewState) {
    if state.view != view {
        debug!(from = state.view.as_str(), to = view.as_str(), "view transition");
        state.view = view;
    }
    if view != ViewState::ConfirmManagement {
        state.managed_domain = None;
    }
}

fn reveal(state: &mut SheetState, effects: &mut Vec<SheetEffect>) {
    if !state.revealed {
        state.revealed = true;
        effects.push(SheetEffect::Reveal);
    }
}

fn dismiss(state: &mut SheetState, action: Option<PromoAction>, effects: &mut Vec<SheetEffect>) {
    if state.finished {
        return;
    }
    state.finished = true;
    state.tasks = Tasks::default();
    if let Some(action) = action {
        effects.push(SheetEffect::Record(action));
    }
    effects.push(SheetEffect::Dismiss);
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use acpick_core::{AccountId, LaunchMode};

    use super::*;
    use crate::common::TaskId;
    use crate::state::{Launch, SheetOptions};

    fn alice() -> Account {
        Account::new("alice", "alice@x.com")
    }

    fn bob() -> Account {
        Account::new("bob", "bob@x.com")
    }

    fn carol() -> Account {
        Account::new("carol", "carol@x.com")
    }

    fn sheet(mode: LaunchMode, accounts: Vec<Account>, target: Option<&str>) -> SheetState {
        sheet_with(mode, accounts, target, SheetOptions::default())
    }

    fn sheet_with(
        mode: LaunchMode,
        accounts: Vec<Account>,
        target: Option<&str>,
        options: SheetOptions,
    ) -> SheetState {
        let launch = Launch::from_mode(mode, accounts, target.map(AccountId::from)).unwrap();
        SheetState::new(launch, HashMap::new(), options).unwrap()
    }

    fn completed(kind: TaskKind, id: TaskId, result: TaskResult) -> SheetEvent {
        SheetEvent::TaskCompleted {
            kind,
            completed: TaskCompleted { id, result },
        }
    }

    fn accounts_changed(accounts: Vec<Account>) -> SheetEvent {
        SheetEvent::AccountsChanged {
            accounts,
            profiles: HashMap::new(),
        }
    }

    /// Extracts the management-check task issued by the last sign-in.
    fn management_task(effects: &[SheetEffect]) -> (TaskId, Account) {
        effects
            .iter()
            .find_map(|effect| match effect {
                SheetEffect::CheckManagement { task, account } => Some((*task, account.clone())),
                _ => None,
            })
            .expect("management check effect")
    }

    fn signin_task(effects: &[SheetEffect]) -> (TaskId, Account) {
        effects
            .iter()
            .find_map(|effect| match effect {
                SheetEffect::SignIn { task, account } => Some((*task, account.clone())),
                _ => None,
            })
            .expect("sign-in effect")
    }

    fn managed(task: TaskId, account: Account, managed: bool) -> SheetEvent {
        completed(
            TaskKind::ManagementCheck,
            task,
            TaskResult::ManagementChecked {
                account,
                managed,
                domain: managed.then(|| "x.com".to_string()),
            },
        )
    }

    fn signin(task: TaskId, account: Account, outcome: SigninOutcome) -> SheetEvent {
        completed(TaskKind::Signin, task, TaskResult::Signin { account, outcome })
    }

    fn has(effects: &[SheetEffect], wanted: impl Fn(&SheetEffect) -> bool) -> bool {
        effects.iter().any(wanted)
    }

    /// Runs the choose-account flow up to a general error after bob's
    /// sign-in aborts.
    fn bob_aborted() -> SheetState {
        let mut state = sheet(LaunchMode::ChooseAccount, vec![alice(), bob()], None);
        let effects = update(&mut state, SheetEvent::AccountSelected(bob()));
        let (task, account) = management_task(&effects);
        let effects = update(&mut state, managed(task, account, false));
        assert_eq!(state.view, ViewState::SigninInProgress);
        let (task, account) = signin_task(&effects);
        update(&mut state, signin(task, account, SigninOutcome::Aborted));
        state
    }

    #[test]
    fn start_records_shown() {
        let mut state = sheet(LaunchMode::Default, vec![alice()], None);
        let effects = start(&mut state);
        assert!(matches!(
            effects.as_slice(),
            [SheetEffect::Record(PromoAction::Shown)]
        ));

        let mut state = sheet(LaunchMode::Default, Vec::new(), None);
        let effects = start(&mut state);
        assert!(matches!(
            effects.as_slice(),
            [SheetEffect::Record(PromoAction::ShownWithNoAccounts)]
        ));
    }

    #[test]
    fn aborted_signin_shows_general_error() {
        let state = bob_aborted();
        assert_eq!(state.view, ViewState::GeneralError);
        assert_eq!(state.selection.selected, Some(bob()));
        assert!(state.signed_in.is_none());
    }

    #[test]
    fn selecting_non_default_account_is_classified() {
        let mut state = sheet(LaunchMode::ChooseAccount, vec![alice(), bob()], None);
        let effects = update(&mut state, SheetEvent::AccountSelected(bob()));
        let (task, account) = management_task(&effects);
        let effects = update(&mut state, managed(task, account, false));
        assert!(has(&effects, |e| matches!(
            e,
            SheetEffect::Record(PromoAction::SignedInWithNonDefaultAccount)
        )));
    }

    #[test]
    fn retry_without_acceptance_rechecks_management() {
        let mut state = bob_aborted();
        let effects = update(&mut state, SheetEvent::ContinueClicked);
        assert_eq!(state.view, ViewState::SigninInProgress);
        let (task, account) = management_task(&effects);
        assert_eq!(account, bob());

        let effects = update(&mut state, managed(task, account, true));
        assert_eq!(state.view, ViewState::ConfirmManagement);
        assert_eq!(state.model().managed_domain.as_deref(), Some("x.com"));
        assert!(has(&effects, |e| matches!(
            e,
            SheetEffect::Record(PromoAction::ConfirmManagementShown)
        )));
        assert!(!has(&effects, |e| matches!(e, SheetEffect::Reveal)));
    }

    #[test]
    fn accepting_management_signs_in_once() {
        let mut state = bob_aborted();
        let effects = update(&mut state, SheetEvent::ContinueClicked);
        let (task, account) = management_task(&effects);
        update(&mut state, managed(task, account, true));

        let effects = update(&mut state, SheetEvent::ContinueClicked);
        assert!(state.accepted_management);
        assert!(state.model().managed_domain.is_none());
        assert!(has(&effects, |e| matches!(
            e,
            SheetEffect::SetManagementAccepted { accepted: true }
        )));
        let (task, account) = signin_task(&effects);

        let effects = update(&mut state, signin(task, account, SigninOutcome::Completed));
        let notified: Vec<_> = effects
            .iter()
            .filter_map(|e| match e {
                SheetEffect::NotifySigninComplete { account } => Some(account.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(notified, vec![bob()]);
        assert_eq!(state.signed_in, Some(bob()));

        // Duplicate completion for the same task is ignored.
        let effects = update(&mut state, signin(task, bob(), SigninOutcome::Completed));
        assert!(effects.is_empty());
    }

    #[test]
    fn abort_after_acceptance_revokes_but_keeps_flag() {
        let mut state = bob_aborted();
        let effects = update(&mut state, SheetEvent::ContinueClicked);
        let (task, account) = management_task(&effects);
        update(&mut state, managed(task, account, true));
        let effects = update(&mut state, SheetEvent::ContinueClicked);
        let (task, account) = signin_task(&effects);

        let effects = update(&mut state, signin(task, account, SigninOutcome::Aborted));
        assert_eq!(state.view, ViewState::GeneralError);
        assert!(state.accepted_management);
        assert!(has(&effects, |e| matches!(
            e,
            SheetEffect::SetManagementAccepted { accepted: false }
        )));

        // Retry skips the management check.
        let effects = update(&mut state, SheetEvent::ContinueClicked);
        assert!(!has(&effects, |e| matches!(e, SheetEffect::CheckManagement { .. })));
        assert!(has(&effects, |e| matches!(e, SheetEffect::SignIn { .. })));
    }

    #[test]
    fn auth_error_clears_acceptance_and_refreshes() {
        let mut state = sheet(LaunchMode::Default, vec![alice()], None);
        state.accepted_management = true;
        let effects = update(&mut state, SheetEvent::ShowAuthError);
        assert_eq!(state.view, ViewState::AuthError);
        assert!(!state.accepted_management);
        assert!(has(&effects, |e| matches!(
            e,
            SheetEffect::SetManagementAccepted { accepted: false }
        )));

        let effects = update(&mut state, SheetEvent::ContinueClicked);
        let task = effects
            .iter()
            .find_map(|e| match e {
                SheetEffect::RefreshCredentials { task, .. } => Some(*task),
                _ => None,
            })
            .expect("refresh effect");

        update(
            &mut state,
            completed(
                TaskKind::CredentialRefresh,
                task,
                TaskResult::CredentialsRefreshed {
                    account: alice(),
                    success: false,
                },
            ),
        );
        assert_eq!(state.view, ViewState::AuthError);

        let effects = update(&mut state, SheetEvent::ContinueClicked);
        let SheetEffect::RefreshCredentials { task, .. } = effects[0] else {
            panic!("expected refresh");
        };
        update(
            &mut state,
            completed(
                TaskKind::CredentialRefresh,
                task,
                TaskResult::CredentialsRefreshed {
                    account: alice(),
                    success: true,
                },
            ),
        );
        assert_eq!(state.view, ViewState::CollapsedList);
    }

    #[test]
    fn back_press_returns_to_initial_view() {
        let mut state = sheet(LaunchMode::Default, vec![alice(), bob()], None);
        update(&mut state, SheetEvent::SelectedAccountClicked);
        assert_eq!(state.view, ViewState::ExpandedList);

        let mut effects = Vec::new();
        assert!(back_pressed(&mut state, &mut effects));
        assert_eq!(state.view, ViewState::CollapsedList);
        assert!(!back_pressed(&mut state, &mut effects));

        let mut state = sheet(LaunchMode::ChooseAccount, vec![alice(), bob()], None);
        assert!(!back_pressed(&mut state, &mut effects));
        assert_eq!(state.view, ViewState::ExpandedList);
        assert!(effects.is_empty());
    }

    #[test]
    fn back_from_error_returns_to_expanded_list() {
        let mut state = bob_aborted();
        let mut effects = Vec::new();
        assert!(back_pressed(&mut state, &mut effects));
        assert_eq!(state.view, ViewState::ExpandedList);
    }

    #[test]
    fn back_press_in_seamless_dismisses() {
        let mut state = sheet(LaunchMode::Seamless, vec![carol()], Some("carol"));
        let (tx, _rx) = tokio::sync::oneshot::channel();
        let effects = update(&mut state, SheetEvent::BackPressed { reply: Some(tx) });
        assert!(state.finished);
        assert!(has(&effects, |e| matches!(e, SheetEffect::Dismiss)));
        assert!(has(&effects, |e| matches!(
            e,
            SheetEffect::AnswerBack {
                consumed: false,
                ..
            }
        )));
    }

    #[test]
    fn seamless_reveals_once_on_management() {
        let mut state = sheet(LaunchMode::Seamless, vec![alice(), carol()], Some("carol"));
        let effects = start(&mut state);
        assert_eq!(state.view, ViewState::SigninInProgress);
        let (task, account) = management_task(&effects);
        assert_eq!(account, carol());

        let effects = update(&mut state, managed(task, account, true));
        assert!(state.revealed);
        assert!(has(&effects, |e| matches!(e, SheetEffect::Reveal)));

        let effects = update(&mut state, SheetEvent::ShowGeneralError);
        assert_eq!(state.view, ViewState::GeneralError);
        assert!(!has(&effects, |e| matches!(e, SheetEffect::Reveal)));
    }

    #[test]
    fn seamless_success_stays_hidden() {
        let mut state = sheet(LaunchMode::Seamless, vec![carol()], Some("carol"));
        let effects = start(&mut state);
        let (task, account) = management_task(&effects);
        let effects = update(&mut state, managed(task, account, false));
        let (task, account) = signin_task(&effects);
        let effects = update(&mut state, signin(task, account, SigninOutcome::Completed));

        assert!(!state.revealed);
        assert!(has(&effects, |e| matches!(e, SheetEffect::NotifySigninComplete { .. })));
        assert!(!has(&effects, |e| matches!(e, SheetEffect::Reveal)));
    }

    #[test]
    fn seamless_rejects_interactive_actions() {
        let mut state = sheet(LaunchMode::Seamless, vec![alice(), carol()], Some("carol"));
        start(&mut state);
        assert!(update(&mut state, SheetEvent::AccountSelected(alice())).is_empty());
        assert!(update(&mut state, SheetEvent::AddAccountClicked).is_empty());
        assert!(update(&mut state, SheetEvent::ShowAuthError).is_empty());
        assert_eq!(state.selection.selected, Some(carol()));
        assert_eq!(state.view, ViewState::SigninInProgress);
    }

    #[test]
    fn seamless_dismisses_when_target_vanishes() {
        let mut state = sheet(LaunchMode::Seamless, vec![alice(), carol()], Some("carol"));
        start(&mut state);
        let effects = update(&mut state, accounts_changed(vec![alice()]));
        assert!(state.finished);
        assert!(has(&effects, |e| matches!(e, SheetEffect::Dismiss)));

        let mut state = sheet(LaunchMode::Seamless, vec![carol()], Some("carol"));
        start(&mut state);
        update(&mut state, accounts_changed(Vec::new()));
        assert!(state.finished);
    }

    #[test]
    fn stale_management_result_is_dropped() {
        let mut state = sheet(LaunchMode::ChooseAccount, vec![alice(), bob()], None);
        let first = update(&mut state, SheetEvent::AccountSelected(alice()));
        let (alice_task, alice_account) = management_task(&first);
        let second = update(&mut state, SheetEvent::AccountSelected(bob()));
        let (bob_task, bob_account) = management_task(&second);

        // Alice's late "managed" answer must not put bob into confirmation.
        let effects = update(&mut state, managed(alice_task, alice_account, true));
        assert!(effects.is_empty());
        assert_eq!(state.view, ViewState::SigninInProgress);

        let effects = update(&mut state, managed(bob_task, bob_account, false));
        let (_, account) = signin_task(&effects);
        assert_eq!(account, bob());
    }

    #[test]
    fn stale_signin_result_is_dropped() {
        let mut state = sheet(LaunchMode::ChooseAccount, vec![alice(), bob()], None);
        let effects = update(&mut state, SheetEvent::AccountSelected(alice()));
        let (task, account) = management_task(&effects);
        let effects = update(&mut state, managed(task, account, false));
        let (alice_signin, _) = signin_task(&effects);

        update(&mut state, SheetEvent::AccountSelected(bob()));
        let effects = update(&mut state, signin(alice_signin, alice(), SigninOutcome::Aborted));
        assert!(effects.is_empty());
        assert_eq!(state.view, ViewState::SigninInProgress);
    }

    #[test]
    fn device_gate_blocks_until_unlocked() {
        let options = SheetOptions {
            requires_device_unlock: true,
            ..SheetOptions::default()
        };
        let mut state = sheet_with(LaunchMode::Default, vec![alice()], None, options);
        let effects = update(&mut state, SheetEvent::ContinueClicked);
        let SheetEffect::RequestDeviceUnlock { task, ref account } = effects[0] else {
            panic!("expected unlock request");
        };
        assert_eq!(account, &alice());

        let unlock = |task, unlocked| {
            completed(
                TaskKind::DeviceUnlock,
                task,
                TaskResult::DeviceUnlock {
                    account: alice(),
                    unlocked,
                },
            )
        };
        let effects = update(&mut state, unlock(task, false));
        assert!(effects.is_empty());
        assert_eq!(state.view, ViewState::CollapsedList);

        let effects = update(&mut state, SheetEvent::ContinueClicked);
        let SheetEffect::RequestDeviceUnlock { task, .. } = effects[0] else {
            panic!("expected unlock request");
        };
        let effects = update(&mut state, unlock(task, true));
        assert_eq!(state.view, ViewState::SigninInProgress);
        assert!(has(&effects, |e| matches!(e, SheetEffect::CheckManagement { .. })));
    }

    #[test]
    fn directory_insert_leaves_no_accounts() {
        let mut state = sheet(LaunchMode::Default, Vec::new(), None);
        update(&mut state, accounts_changed(vec![alice()]));
        assert_eq!(state.view, ViewState::CollapsedList);
        assert_eq!(state.selection.selected, Some(alice()));

        update(&mut state, accounts_changed(Vec::new()));
        assert_eq!(state.view, ViewState::NoAccounts);
        assert!(state.selection.selected.is_none());
        assert!(state.selection.default.is_none());
    }

    #[test]
    fn pending_added_account_signs_in_when_it_appears() {
        let mut state = sheet(LaunchMode::Default, vec![alice()], None);
        let effects = update(&mut state, SheetEvent::AddAccountClicked);
        let SheetEffect::RequestAddAccount { task } = effects[1] else {
            panic!("expected add account request");
        };

        update(
            &mut state,
            completed(
                TaskKind::AddAccount,
                task,
                TaskResult::AccountAdded {
                    email: Some("carol@x.com".to_string()),
                },
            ),
        );
        assert_eq!(
            state.selection.pending_added_email.as_deref(),
            Some("carol@x.com")
        );
        assert_eq!(state.view, ViewState::CollapsedList);

        let effects = update(&mut state, accounts_changed(vec![alice(), carol()]));
        assert_eq!(state.selection.selected, Some(carol()));
        assert_eq!(state.selection.added, Some(carol()));
        assert!(state.selection.pending_added_email.is_none());
        let (task, account) = management_task(&effects);

        let effects = update(&mut state, managed(task, account, false));
        assert!(has(&effects, |e| matches!(
            e,
            SheetEffect::Record(PromoAction::SignedInWithAddedAccount)
        )));
    }

    #[test]
    fn choosing_another_account_drops_pending_added() {
        let mut state = sheet(LaunchMode::ChooseAccount, vec![alice(), bob()], None);
        state.selection.pending_added_email = Some("carol@x.com".to_string());
        update(&mut state, SheetEvent::AccountSelected(bob()));
        assert!(state.selection.pending_added_email.is_none());
    }

    #[test]
    fn delegate_can_take_over_add_account() {
        let options = SheetOptions {
            delegate_handles_add_account: true,
            ..SheetOptions::default()
        };
        let mut state = sheet_with(LaunchMode::Default, Vec::new(), None, options);
        let effects = update(&mut state, SheetEvent::ContinueClicked);
        assert!(has(&effects, |e| matches!(e, SheetEffect::DelegateAddAccount)));
        assert!(!state.tasks.is_any_running());
    }

    #[test]
    fn events_after_dismiss_are_ignored() {
        let mut state = sheet(LaunchMode::Default, vec![alice()], None);
        let effects = update(&mut state, SheetEvent::Dismissed);
        assert!(has(&effects, |e| matches!(
            e,
            SheetEffect::Record(PromoAction::DismissedButton)
        )));
        assert!(update(&mut state, SheetEvent::ContinueClicked).is_empty());
    }

    #[test]
    fn add_account_survives_an_emptied_directory() {
        let mut state = sheet(LaunchMode::Default, Vec::new(), None);
        let effects = update(&mut state, SheetEvent::AddAccountClicked);
        let task = effects
            .iter()
            .find_map(|effect| match effect {
                SheetEffect::RequestAddAccount { task } => Some(*task),
                _ => None,
            })
            .expect("add account request");

        update(&mut state, accounts_changed(Vec::new()));
        assert_eq!(state.view, ViewState::NoAccounts);

        update(
            &mut state,
            completed(
                TaskKind::AddAccount,
                task,
                TaskResult::AccountAdded {
                    email: Some("alice@x.com".to_string()),
                },
            ),
        );
        assert_eq!(
            state.selection.pending_added_email.as_deref(),
            Some("alice@x.com")
        );

        let effects = update(&mut state, accounts_changed(vec![alice()]));
        assert_eq!(state.selection.selected, Some(alice()));
        assert_eq!(state.selection.added, Some(alice()));
        assert!(has(&effects, |e| matches!(e, SheetEffect::CheckManagement { .. })));
    }

    #[test]
    fn signin_completion_survives_an_emptied_directory() {
        let mut state = sheet(LaunchMode::Default, vec![alice()], None);
        let effects = update(&mut state, SheetEvent::ContinueClicked);
        let (task, account) = management_task(&effects);
        let effects = update(&mut state, managed(task, account, false));
        let (task, account) = signin_task(&effects);

        update(&mut state, accounts_changed(Vec::new()));
        assert_eq!(state.view, ViewState::NoAccounts);
        assert!(state.tasks.signin.is_running());

        let effects = update(&mut state, signin(task, account, SigninOutcome::Completed));
        assert!(has(&effects, |e| matches!(
            e,
            SheetEffect::NotifySigninComplete { account } if *account == alice()
        )));
        assert_eq!(state.signed_in, Some(alice()));
    }

    #[test]
    fn emptied_directory_drops_selection_bound_steps() {
        let mut state = sheet(LaunchMode::Default, vec![alice()], None);
        let effects = update(&mut state, SheetEvent::ContinueClicked);
        let (task, account) = management_task(&effects);

        update(&mut state, accounts_changed(Vec::new()));
        assert!(!state.tasks.management_check.is_running());

        let effects = update(&mut state, managed(task, account, false));
        assert!(effects.is_empty());
        assert_eq!(state.view, ViewState::NoAccounts);
    }

    #[test]
    fn retry_after_acceptance_restarts_signin_timer() {
        let mut state = bob_aborted();
        let effects = update(&mut state, SheetEvent::ContinueClicked);
        let (task, account) = management_task(&effects);
        update(&mut state, managed(task, account, true));
        let effects = update(&mut state, SheetEvent::ContinueClicked);
        let (task, account) = signin_task(&effects);
        update(&mut state, signin(task, account, SigninOutcome::Aborted));
        assert_eq!(state.view, ViewState::GeneralError);

        let effects = update(&mut state, SheetEvent::ContinueClicked);
        assert!(has(&effects, |e| matches!(e, SheetEffect::StartSigninTimer)));
        assert!(has(&effects, |e| matches!(e, SheetEffect::SignIn { .. })));
        assert_eq!(state.view, ViewState::SigninInProgress);
    }
}
