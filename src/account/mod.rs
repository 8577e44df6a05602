//! Account entity and its store.
//!
//! An account is the identity root of a user, bot or app inside a realm. It
//! carries at most one pending transient token: either a confirmation
//! challenge (`ac.` prefix) or a temporary token (`tt.` prefix) that is
//! exchanged for a bearer authorization.

mod store;

pub use store::{AccountStore, MAX_CLIENT_ID_ATTEMPTS};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ClientId, NativeKey};

/// Lifecycle state of an account.
///
/// Stored as its integer code. Accounts with a negative code may not log
/// out on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum AccountStatus {
    #[default]
    Unconfirmed,
    Blocked,
    Deactivated,
    LoggedOut,
    Active,
}

impl AccountStatus {
    pub fn code(self) -> i64 {
        match self {
            Self::Unconfirmed => -3,
            Self::Blocked => -2,
            Self::Deactivated => -1,
            Self::LoggedOut => 0,
            Self::Active => 1,
        }
    }

    /// Negative codes: the account cannot end a session by itself.
    pub fn is_suspended(self) -> bool {
        self.code() < 0
    }
}

impl From<AccountStatus> for i64 {
    fn from(status: AccountStatus) -> Self {
        status.code()
    }
}

impl TryFrom<i64> for AccountStatus {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            -3 => Ok(Self::Unconfirmed),
            -2 => Ok(Self::Blocked),
            -1 => Ok(Self::Deactivated),
            0 => Ok(Self::LoggedOut),
            1 => Ok(Self::Active),
            other => Err(format!("unknown account status {}", other)),
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unconfirmed => "unconfirmed",
            Self::Blocked => "blocked",
            Self::Deactivated => "deactivated",
            Self::LoggedOut => "logged_out",
            Self::Active => "active",
        };
        write!(f, "{}", s)
    }
}

/// Identity record, one per `(realm, user_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub realm: String,
    pub user_id: String,
    pub client_id: ClientId,
    pub status: AccountStatus,

    /// Pending challenge or temporary token, empty when none is pending.
    #[serde(default)]
    pub token: String,
    /// Validity of `token` in unix seconds, `0` means never expires.
    #[serde(default)]
    pub expires: i64,
    /// Time of the first successful challenge confirmation, `0` until then.
    #[serde(default)]
    pub confirmed: i64,

    #[serde(default)]
    pub last_login: i64,
    #[serde(default)]
    pub login_count: i64,
    #[serde(default)]
    pub login_from: String,

    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub updated: i64,
}

impl Account {
    /// Storage and cache key, `"{realm}.{client_id}"`.
    pub fn key(&self) -> NativeKey {
        NativeKey::compose(&self.realm, self.client_id.as_str())
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed != 0
    }

    /// Whether the pending token has run out at `now`.
    pub fn token_expired(&self, now: i64) -> bool {
        self.expires != 0 && self.expires < now
    }
}
