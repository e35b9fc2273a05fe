//! Account values supplied by the account directory.
//!
//! Accounts are immutable snapshots. They appear and disappear with device
//! state; the picker never creates or removes them itself.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque account identifier, stable across sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// An on-device account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl Account {
    /// Creates an account with only identity fields set.
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: AccountId::new(id),
            email: email.into(),
            full_name: None,
            given_name: None,
            avatar: None,
        }
    }

    #[must_use]
    pub fn with_names(mut self, full_name: impl Into<String>, given_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self.given_name = Some(given_name.into());
        self
    }

    /// Returns true if both values refer to the same account.
    ///
    /// Accounts are compared by identifier; display fields may change between
    /// snapshots without changing identity.
    pub fn same_account(&self, other: &Account) -> bool {
        self.id == other.id
    }

    /// Finds the account with the given email (case-insensitive).
    pub fn find_by_email<'a>(accounts: &'a [Account], email: &str) -> Option<&'a Account> {
        accounts
            .iter()
            .find(|account| account.email.eq_ignore_ascii_case(email))
    }

    pub fn find_by_id<'a>(accounts: &'a [Account], id: &AccountId) -> Option<&'a Account> {
        accounts.iter().find(|account| &account.id == id)
    }
}

/// Display data served by the profile cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// An account snapshot that is guaranteed to contain at least one account.
///
/// Seamless sign-in can only be constructed from this type, which keeps the
/// "directory must not be empty" precondition out of the runtime paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyAccounts {
    first: Account,
    rest: Vec<Account>,
}

impl NonEmptyAccounts {
    /// Returns `None` when the snapshot is empty.
    pub fn new(accounts: Vec<Account>) -> Option<Self> {
        let mut iter = accounts.into_iter();
        let first = iter.next()?;
        Some(Self {
            first,
            rest: iter.collect(),
        })
    }

    pub fn first(&self) -> &Account {
        &self.first
    }

    pub fn find(&self, id: &AccountId) -> Option<&Account> {
        std::iter::once(&self.first)
            .chain(self.rest.iter())
            .find(|account| &account.id == id)
    }

    pub fn into_vec(self) -> Vec<Account> {
        let mut accounts = Vec::with_capacity(1 + self.rest.len());
        accounts.push(self.first);
        accounts.extend(self.rest);
        accounts
    }
}
