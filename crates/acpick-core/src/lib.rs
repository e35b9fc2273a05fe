//! Core account picker library (accounts, collaborators, config, logging).

pub mod account;
pub mod collaborators;
pub mod config;
pub mod launch;
pub mod logging;
pub mod memory;
pub mod telemetry;

pub use account::{Account, AccountId, DisplayData, NonEmptyAccounts};
pub use launch::LaunchMode;
