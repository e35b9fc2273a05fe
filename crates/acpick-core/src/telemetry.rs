//! Picker telemetry vocabulary.
//!
//! The picker reports what happened; where the numbers end up is the
//! telemetry collaborator's business. `TracingTelemetry` just logs them.

use std::time::Duration;

/// User-visible milestones of one picker invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromoAction {
    Shown,
    ShownWithNoAccounts,
    AddAccountStarted,
    AddAccountCompleted,
    SignedInWithDefaultAccount,
    SignedInWithNonDefaultAccount,
    SignedInWithAddedAccount,
    GenericErrorShown,
    AuthErrorShown,
    ConfirmManagementShown,
    ConfirmManagementAccepted,
    DismissedBack,
    DismissedButton,
}

impl PromoAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromoAction::Shown => "shown",
            PromoAction::ShownWithNoAccounts => "shown_with_no_accounts",
            PromoAction::AddAccountStarted => "add_account_started",
            PromoAction::AddAccountCompleted => "add_account_completed",
            PromoAction::SignedInWithDefaultAccount => "signed_in_with_default_account",
            PromoAction::SignedInWithNonDefaultAccount => "signed_in_with_non_default_account",
            PromoAction::SignedInWithAddedAccount => "signed_in_with_added_account",
            PromoAction::GenericErrorShown => "generic_error_shown",
            PromoAction::AuthErrorShown => "auth_error_shown",
            PromoAction::ConfirmManagementShown => "confirm_management_shown",
            PromoAction::ConfirmManagementAccepted => "confirm_management_accepted",
            PromoAction::DismissedBack => "dismissed_back",
            PromoAction::DismissedButton => "dismissed_button",
        }
    }
}

/// Receives picker telemetry.
pub trait Telemetry: Send + Sync {
    fn record_action(&self, action: PromoAction);

    /// Time from the start of a sign-in attempt to its completion.
    fn record_signin_duration(&self, elapsed: Duration);
}

/// Telemetry sink that writes to the `tracing` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn record_action(&self, action: PromoAction) {
        tracing::info!(target: "acpick::telemetry", action = action.as_str(), "promo action");
    }

    fn record_signin_duration(&self, elapsed: Duration) {
        tracing::info!(
            target: "acpick::telemetry",
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "sign-in duration"
        );
    }
}
