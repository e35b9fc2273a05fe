use acpick_core::AccountId;

/// Errors surfaced by the sheet API.
///
/// Sign-in failures are not errors here; they are view states.
#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("seamless sign-in requires at least one account on the device")]
    EmptyDirectory,
    #[error("seamless sign-in requires a target account")]
    MissingTarget,
    #[error("seamless sign-in target '{0}' is not on the device")]
    TargetNotFound(AccountId),
    #[error("the account picker is closed")]
    Closed,
}
