//! Sheet effect types.
//!
//! Effects are commands returned by the reducer that the runtime executes.
//! The reducer never calls a collaborator directly; it mutates state, marks
//! the matching task active, and returns an effect describing the call.

use acpick_core::Account;
use acpick_core::telemetry::PromoAction;
use tokio::sync::oneshot;

use crate::common::TaskId;

/// Effects returned by the reducer for the runtime to execute.
#[derive(Debug)]
pub enum SheetEffect {
    /// Ask the device gate to unlock before signing in `account`.
    RequestDeviceUnlock { task: TaskId, account: Account },

    /// Ask the delegate whether `account` is managed.
    CheckManagement { task: TaskId, account: Account },

    /// Sign `account` in, signing out the current primary account first.
    SignIn { task: TaskId, account: Account },

    /// Refresh credentials after an auth error.
    RefreshCredentials { task: TaskId, account: Account },

    /// Launch the system add-account flow.
    RequestAddAccount { task: TaskId },

    /// Hand add-account over to the delegate.
    DelegateAddAccount,

    /// Persist or revoke management acceptance with the delegate.
    SetManagementAccepted { accepted: bool },

    /// Tell the delegate sign-in finished and hand over the state controller.
    NotifySigninComplete { account: Account },

    /// Start the sign-in duration clock.
    StartSigninTimer,

    Record(PromoAction),

    /// Show the sheet (seamless sign-in only). Emitted at most once.
    Reveal,

    /// Answer a `back_pressed` call.
    AnswerBack {
        reply: oneshot::Sender<bool>,
        consumed: bool,
    },

    /// End the flow and notify the delegate.
    Dismiss,
}
