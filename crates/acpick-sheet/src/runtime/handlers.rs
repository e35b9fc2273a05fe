//! Collaborator calls.
//!
//! Pure async functions: the runtime spawns them and sends what they return
//! to the inbox. None of them see sheet state.

use std::collections::HashMap;
use std::sync::Arc;

use acpick_core::collaborators::{AccountDirectory, DeviceGate, ProfileCache, SigninDelegate};
use acpick_core::{Account, AccountId, DisplayData};
use tracing::debug;

use crate::events::{SheetEvent, TaskResult};

pub async fn device_unlock(gate: Arc<dyn DeviceGate>, account: Account) -> TaskResult {
    let unlocked = gate.request_unlock(&account).await;
    TaskResult::DeviceUnlock { account, unlocked }
}

/// Checks management and, for managed accounts, resolves the domain shown
/// in the confirmation.
pub async fn check_management(delegate: Arc<dyn SigninDelegate>, account: Account) -> TaskResult {
    let managed = delegate.is_account_managed(&account).await;
    let domain = managed.then(|| delegate.extract_domain(&account.email));
    TaskResult::ManagementChecked {
        account,
        managed,
        domain,
    }
}

/// Signs `account` in. A primary account that is already signed in is
/// signed out first.
pub async fn sign_in(delegate: Arc<dyn SigninDelegate>, account: Account) -> TaskResult {
    if delegate.has_primary_account() {
        debug!(account = %account.id, "signing out primary account before sign-in");
        delegate.on_signout_before_signin();
        delegate.sign_out().await;
    }
    let outcome = delegate.sign_in(&account).await;
    TaskResult::Signin { account, outcome }
}

pub async fn refresh_credentials(delegate: Arc<dyn SigninDelegate>, account: Account) -> TaskResult {
    let success = delegate.refresh_credentials(&account).await;
    TaskResult::CredentialsRefreshed { account, success }
}

pub async fn add_account(directory: Arc<dyn AccountDirectory>) -> TaskResult {
    let email = directory.request_add_account().await;
    TaskResult::AccountAdded { email }
}

pub fn display_map(profiles: &dyn ProfileCache, accounts: &[Account]) -> HashMap<AccountId, DisplayData> {
    accounts
        .iter()
        .map(|account| (account.id.clone(), profiles.display_data(&account.id)))
        .collect()
}

/// Fetches the directory and the display data for every account in it.
pub async fn snapshot(directory: &dyn AccountDirectory, profiles: &dyn ProfileCache) -> SheetEvent {
    let accounts = directory.accounts().await;
    let profiles = display_map(profiles, &accounts);
    SheetEvent::AccountsChanged { accounts, profiles }
}
