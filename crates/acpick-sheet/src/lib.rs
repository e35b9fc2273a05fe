//! Account picker sign-in orchestration.
//!
//! `SheetRuntime` drives one picker invocation: it owns `SheetState`, feeds
//! inbox events to the `update` reducer, executes the returned effects
//! against the collaborators, and publishes a `SheetModel` for renderers.

pub mod common;
pub mod effects;
pub mod error;
pub mod events;
pub mod handle;
pub mod model;
pub mod reconcile;
pub mod runtime;
pub mod state;
pub mod update;

pub use error::SheetError;
pub use handle::{SheetHandle, SigninStateController};
pub use model::{AccountItem, SheetModel, ViewState};
pub use runtime::{Collaborators, SheetOutcome, SheetRequest, SheetRuntime};
