//! Collaborator interfaces consumed by the picker.
//!
//! The picker never stores credentials or talks to the network itself. Every
//! outside effect goes through one of these traits:
//!
//! - `AccountDirectory`: on-device account list, change notifications, and
//!   the system "add account" flow
//! - `ProfileCache`: display data (name, avatar) per account
//! - `SigninDelegate`: the sign-in executor (managed check, sign-in,
//!   credential refresh, management acceptance)
//! - `DeviceGate`: extra unlock step on restricted devices
//!
//! Subscriptions are `tokio::sync::broadcast` receivers. Dropping the receiver
//! unsubscribes, so observers are paired with the lifetime of whoever holds
//! them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::account::{Account, AccountId, DisplayData};

/// Supplies the current on-device accounts.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Fetches the current account snapshot, in directory order.
    async fn accounts(&self) -> Vec<Account>;

    /// Subscribes to "account list changed" notifications.
    fn subscribe(&self) -> broadcast::Receiver<()>;

    /// Launches the system add-account flow.
    ///
    /// Resolves to the email of the added account, or `None` if the user
    /// cancelled.
    async fn request_add_account(&self) -> Option<String>;
}

/// Maps account identifiers to display data.
pub trait ProfileCache: Send + Sync {
    fn display_data(&self, id: &AccountId) -> DisplayData;

    /// Subscribes to display data changes; each message names the account
    /// whose data changed.
    fn subscribe(&self) -> broadcast::Receiver<AccountId>;
}

/// Result of a sign-in attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigninOutcome {
    Completed,
    Aborted,
}

/// Lets a delegate surface failures after it already reported completion.
pub trait SigninController: Send + Sync {
    fn show_general_error(&self);
    fn show_auth_error(&self);
}

/// Performs the actual sign-in work on behalf of the picker.
#[async_trait]
pub trait SigninDelegate: Send + Sync {
    /// Returns whether the account is subject to organization policy.
    async fn is_account_managed(&self, account: &Account) -> bool;

    /// Resolves a human-readable domain for a managed account.
    fn extract_domain(&self, email: &str) -> String;

    /// Persists (or revokes) the user's acceptance of account management.
    fn set_management_accepted(&self, accepted: bool);

    /// Returns whether a primary account is already signed in.
    fn has_primary_account(&self) -> bool;

    /// Called before a forced sign-out of the current primary account.
    fn on_signout_before_signin(&self);

    async fn sign_out(&self);

    async fn sign_in(&self, account: &Account) -> SigninOutcome;

    /// Called once a sign-in attempt completed.
    ///
    /// The controller stays valid for the lifetime of the picker and can be
    /// used to surface errors from later steps.
    fn on_signin_complete(&self, account: &Account, controller: Arc<dyn SigninController>);

    /// Refreshes credentials after an auth error. Returns true on success.
    async fn refresh_credentials(&self, account: &Account) -> bool;

    /// Returns true if the delegate performs "add account" itself.
    fn can_handle_add_account(&self) -> bool {
        false
    }

    /// Runs the delegate's own add-account flow.
    fn add_account(&self) {}

    /// Called when the picker is dismissed.
    fn on_dismiss(&self) {}
}

/// Platform unlock requirement interposed before sign-in.
#[async_trait]
pub trait DeviceGate: Send + Sync {
    /// Returns whether this device class requires an unlock before sign-in.
    fn is_required(&self) -> bool;

    /// Requests a device unlock. Returns true only if the user unlocked.
    async fn request_unlock(&self, account: &Account) -> bool;
}

/// Gate used on device classes without an unlock requirement.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDeviceGate;

#[async_trait]
impl DeviceGate for NoDeviceGate {
    fn is_required(&self) -> bool {
        false
    }

    async fn request_unlock(&self, _account: &Account) -> bool {
        true
    }
}
