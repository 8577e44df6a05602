//! Typed results of the token exchange protocol.
//!
//! Each protocol operation returns one of these enums for every outcome the
//! caller is expected to handle. An HTTP adapter maps them 1:1 onto a
//! response via `status()`.

use crate::account::Account;
use crate::auth::Authorization;

/// Response class an adapter answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    Created,
    NoContent,
    TemporaryRedirect,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    InternalServerError,
}

impl StatusCode {
    /// Numeric HTTP status.
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Created => 201,
            Self::NoContent => 204,
            Self::TemporaryRedirect => 307,
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::InternalServerError => 500,
        }
    }

    pub fn is_success(self) -> bool {
        self.as_u16() < 400
    }
}

/// Result of a login request.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// A new or renewed challenge was sent.
    ChallengeSent(Account),
    /// The account was logged out; a temporary token was sent.
    TokenSent(Account),
    /// The account is confirmed and not logged out.
    AlreadyAuthorized,
}

impl LoginOutcome {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ChallengeSent(_) => StatusCode::Created,
            Self::TokenSent(_) => StatusCode::NoContent,
            Self::AlreadyAuthorized => StatusCode::Forbidden,
        }
    }
}

/// Result of confirming a challenge token.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    /// The challenge was consumed; the account is now logged out.
    Confirmed(Account),
    /// The challenge was consumed and a temporary token was sent.
    TokenSent { account: Account, location: String },
    /// No account holds this token.
    UnknownToken,
    /// The token exists but has expired.
    Expired,
}

impl ConfirmOutcome {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Confirmed(_) => StatusCode::NoContent,
            Self::TokenSent { .. } => StatusCode::TemporaryRedirect,
            Self::UnknownToken => StatusCode::Unauthorized,
            Self::Expired => StatusCode::Forbidden,
        }
    }
}

/// Result of exchanging a temporary token for a bearer authorization.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeOutcome {
    Issued(Authorization),
    NoSuchAccount,
    /// Token mismatch or expired token.
    InvalidToken,
    /// A first authorization asked for scope outside the configured scope.
    ScopeNotAllowed,
}

impl ExchangeOutcome {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Issued(_) => StatusCode::Ok,
            Self::NoSuchAccount => StatusCode::NotFound,
            Self::InvalidToken => StatusCode::Unauthorized,
            Self::ScopeNotAllowed => StatusCode::Forbidden,
        }
    }
}

/// Result of a logout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    LoggedOut,
    /// The account is blocked or deactivated.
    Forbidden,
}

impl LogoutOutcome {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::LoggedOut => StatusCode::NoContent,
            Self::Forbidden => StatusCode::Forbidden,
        }
    }
}

/// Result of checking a bearer token against a scope.
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    Granted(Authorization),
    Denied,
}

impl Access {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Granted(_) => StatusCode::Ok,
            Self::Denied => StatusCode::Unauthorized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(StatusCode::TemporaryRedirect.as_u16(), 307);
        assert!(StatusCode::NoContent.is_success());
        assert!(!StatusCode::Forbidden.is_success());
    }

    #[test]
    fn test_outcome_mapping() {
        assert_eq!(LoginOutcome::AlreadyAuthorized.status(), StatusCode::Forbidden);
        assert_eq!(ConfirmOutcome::UnknownToken.status(), StatusCode::Unauthorized);
        assert_eq!(ConfirmOutcome::Expired.status(), StatusCode::Forbidden);
        assert_eq!(ExchangeOutcome::NoSuchAccount.status(), StatusCode::NotFound);
        assert_eq!(ExchangeOutcome::InvalidToken.status(), StatusCode::Unauthorized);
        assert_eq!(ExchangeOutcome::ScopeNotAllowed.status(), StatusCode::Forbidden);
        assert_eq!(LogoutOutcome::LoggedOut.status(), StatusCode::NoContent);
        assert_eq!(LogoutOutcome::Forbidden.status(), StatusCode::Forbidden);
        assert!(!Access::Denied.is_granted());
    }
}
