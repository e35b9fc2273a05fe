//! In-memory collaborators.
//!
//! Used by `acpick run` to replay scenarios and by tests. Outcomes are
//! scripted as queues; when a queue runs dry the collaborator falls back to
//! the happy path (not managed, sign-in completes, unlock and refresh
//! succeed).

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use crate::account::{Account, AccountId, DisplayData};
use crate::collaborators::{
    AccountDirectory, DeviceGate, ProfileCache, SigninController, SigninDelegate, SigninOutcome,
};
use crate::telemetry::{PromoAction, Telemetry};

const CHANNEL_CAPACITY: usize = 32;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Account directory
// ============================================================================

/// What the system add-account flow returns next.
#[derive(Debug, Clone)]
pub struct AddedAccountScript {
    pub account: Account,
    /// Insert the account into the directory before reporting its email.
    /// When false the account only shows up once someone inserts it.
    pub visible_immediately: bool,
}

pub struct MemoryDirectory {
    accounts: Mutex<Vec<Account>>,
    added: Mutex<VecDeque<AddedAccountScript>>,
    changes: broadcast::Sender<()>,
}

impl MemoryDirectory {
    pub fn new(accounts: Vec<Account>) -> Self {
        let (changes, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            accounts: Mutex::new(accounts),
            added: Mutex::new(VecDeque::new()),
            changes,
        }
    }

    pub fn snapshot(&self) -> Vec<Account> {
        lock(&self.accounts).clone()
    }

    /// Replaces the snapshot and notifies subscribers.
    pub fn set_accounts(&self, accounts: Vec<Account>) {
        *lock(&self.accounts) = accounts;
        self.notify();
    }

    /// Appends an account (replacing one with the same id) and notifies.
    pub fn insert(&self, account: Account) {
        {
            let mut accounts = lock(&self.accounts);
            accounts.retain(|existing| existing.id != account.id);
            accounts.push(account);
        }
        self.notify();
    }

    /// Removes an account and notifies. Returns false if it was not present.
    pub fn remove(&self, id: &AccountId) -> bool {
        let removed = {
            let mut accounts = lock(&self.accounts);
            let before = accounts.len();
            accounts.retain(|existing| &existing.id != id);
            accounts.len() != before
        };
        if removed {
            self.notify();
        }
        removed
    }

    /// Queues the result of the next system add-account request.
    pub fn queue_added_account(&self, script: AddedAccountScript) {
        lock(&self.added).push_back(script);
    }

    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    fn notify(&self) {
        // No receivers is fine: nobody is watching yet.
        let _ = self.changes.send(());
    }
}

#[async_trait]
impl AccountDirectory for MemoryDirectory {
    async fn accounts(&self) -> Vec<Account> {
        self.snapshot()
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }

    async fn request_add_account(&self) -> Option<String> {
        let script = lock(&self.added).pop_front()?;
        let email = script.account.email.clone();
        if script.visible_immediately {
            self.insert(script.account);
        }
        Some(email)
    }
}

// ============================================================================
// Profile cache
// ============================================================================

pub struct MemoryProfileCache {
    entries: Mutex<HashMap<AccountId, DisplayData>>,
    changes: broadcast::Sender<AccountId>,
}

impl Default for MemoryProfileCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProfileCache {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            entries: Mutex::new(HashMap::new()),
            changes,
        }
    }

    /// Stores display data and notifies subscribers.
    pub fn set(&self, id: AccountId, data: DisplayData) {
        lock(&self.entries).insert(id.clone(), data);
        let _ = self.changes.send(id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }
}

impl ProfileCache for MemoryProfileCache {
    fn display_data(&self, id: &AccountId) -> DisplayData {
        lock(&self.entries).get(id).cloned().unwrap_or_default()
    }

    fn subscribe(&self) -> broadcast::Receiver<AccountId> {
        self.changes.subscribe()
    }
}

// ============================================================================
// Sign-in delegate
// ============================================================================

/// Calls observed by `ScriptedDelegate`, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegateCall {
    ManagedCheck(AccountId),
    SetManagementAccepted(bool),
    SignoutBeforeSignin,
    SignOut,
    SignIn(AccountId),
    SigninComplete(AccountId),
    RefreshCredentials(AccountId),
    AddAccount,
    Dismiss,
}

pub struct ScriptedDelegate {
    managed: Mutex<HashMap<AccountId, bool>>,
    managed_checks: Mutex<VecDeque<bool>>,
    signin_outcomes: Mutex<VecDeque<SigninOutcome>>,
    refresh_results: Mutex<VecDeque<bool>>,
    signin_delay: Mutex<Option<Duration>>,
    handles_add_account: bool,
    primary: Mutex<Option<AccountId>>,
    controller: Mutex<Option<Arc<dyn SigninController>>>,
    calls: Mutex<Vec<DelegateCall>>,
    completions: watch::Sender<Vec<Account>>,
}

impl Default for ScriptedDelegate {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedDelegate {
    pub fn new() -> Self {
        let (completions, _) = watch::channel(Vec::new());
        Self {
            managed: Mutex::new(HashMap::new()),
            managed_checks: Mutex::new(VecDeque::new()),
            signin_outcomes: Mutex::new(VecDeque::new()),
            refresh_results: Mutex::new(VecDeque::new()),
            signin_delay: Mutex::new(None),
            handles_add_account: false,
            primary: Mutex::new(None),
            controller: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            completions,
        }
    }

    #[must_use]
    pub fn handling_add_account(mut self) -> Self {
        self.handles_add_account = true;
        self
    }

    /// Marks an account as managed for every check not overridden by
    /// `queue_managed_check`.
    pub fn set_managed(&self, id: AccountId, managed: bool) {
        lock(&self.managed).insert(id, managed);
    }

    pub fn queue_managed_check(&self, managed: bool) {
        lock(&self.managed_checks).push_back(managed);
    }

    pub fn queue_signin(&self, outcome: SigninOutcome) {
        lock(&self.signin_outcomes).push_back(outcome);
    }

    pub fn queue_refresh(&self, success: bool) {
        lock(&self.refresh_results).push_back(success);
    }

    pub fn set_signin_delay(&self, delay: Option<Duration>) {
        *lock(&self.signin_delay) = delay;
    }

    pub fn set_primary(&self, id: Option<AccountId>) {
        *lock(&self.primary) = id;
    }

    pub fn calls(&self) -> Vec<DelegateCall> {
        lock(&self.calls).clone()
    }

    /// Accounts reported through `on_signin_complete`, in order.
    pub fn completions(&self) -> watch::Receiver<Vec<Account>> {
        self.completions.subscribe()
    }

    /// The controller handed over with the latest completion.
    pub fn controller(&self) -> Option<Arc<dyn SigninController>> {
        lock(&self.controller).clone()
    }

    fn record(&self, call: DelegateCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl SigninDelegate for ScriptedDelegate {
    async fn is_account_managed(&self, account: &Account) -> bool {
        self.record(DelegateCall::ManagedCheck(account.id.clone()));
        let scripted = lock(&self.managed_checks).pop_front();
        scripted.unwrap_or_else(|| lock(&self.managed).get(&account.id).copied().unwrap_or(false))
    }

    fn extract_domain(&self, email: &str) -> String {
        email
            .rsplit_once('@')
            .map_or_else(|| email.to_string(), |(_, domain)| domain.to_string())
    }

    fn set_management_accepted(&self, accepted: bool) {
        self.record(DelegateCall::SetManagementAccepted(accepted));
    }

    fn has_primary_account(&self) -> bool {
        lock(&self.primary).is_some()
    }

    fn on_signout_before_signin(&self) {
        self.record(DelegateCall::SignoutBeforeSignin);
    }

    async fn sign_out(&self) {
        self.record(DelegateCall::SignOut);
        *lock(&self.primary) = None;
    }

    async fn sign_in(&self, account: &Account) -> SigninOutcome {
        self.record(DelegateCall::SignIn(account.id.clone()));
        let delay = *lock(&self.signin_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = lock(&self.signin_outcomes)
            .pop_front()
            .unwrap_or(SigninOutcome::Completed);
        if outcome == SigninOutcome::Completed {
            *lock(&self.primary) = Some(account.id.clone());
        }
        outcome
    }

    fn on_signin_complete(&self, account: &Account, controller: Arc<dyn SigninController>) {
        self.record(DelegateCall::SigninComplete(account.id.clone()));
        *lock(&self.controller) = Some(controller);
        let account = account.clone();
        self.completions.send_modify(|done| done.push(account));
    }

    async fn refresh_credentials(&self, account: &Account) -> bool {
        self.record(DelegateCall::RefreshCredentials(account.id.clone()));
        lock(&self.refresh_results).pop_front().unwrap_or(true)
    }

    fn can_handle_add_account(&self) -> bool {
        self.handles_add_account
    }

    fn add_account(&self) {
        self.record(DelegateCall::AddAccount);
    }

    fn on_dismiss(&self) {
        self.record(DelegateCall::Dismiss);
    }
}

// ============================================================================
// Device gate
// ============================================================================

pub struct ScriptedDeviceGate {
    required: bool,
    results: Mutex<VecDeque<bool>>,
    requests: Mutex<Vec<AccountId>>,
}

impl ScriptedDeviceGate {
    pub fn new(required: bool) -> Self {
        Self {
            required,
            results: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_unlock(&self, success: bool) {
        lock(&self.results).push_back(success);
    }

    pub fn requests(&self) -> Vec<AccountId> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl DeviceGate for ScriptedDeviceGate {
    fn is_required(&self) -> bool {
        self.required
    }

    async fn request_unlock(&self, account: &Account) -> bool {
        lock(&self.requests).push(account.id.clone());
        lock(&self.results).pop_front().unwrap_or(true)
    }
}

// ============================================================================
// Telemetry
// ============================================================================

#[derive(Default)]
pub struct RecordingTelemetry {
    actions: Mutex<Vec<PromoAction>>,
    durations: Mutex<Vec<Duration>>,
}

impl RecordingTelemetry {
    pub fn actions(&self) -> Vec<PromoAction> {
        lock(&self.actions).clone()
    }

    pub fn durations(&self) -> Vec<Duration> {
        lock(&self.durations).clone()
    }
}

impl Telemetry for RecordingTelemetry {
    fn record_action(&self, action: PromoAction) {
        lock(&self.actions).push(action);
    }

    fn record_signin_duration(&self, elapsed: Duration) {
        lock(&self.durations).push(elapsed);
    }
}
