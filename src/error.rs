//! Error types shared by the stores and the token exchange protocol.
//!
//! Three conventions are held everywhere in this crate:
//!
//! - a lookup that finds nothing returns `Ok(None)`;
//! - a protocol precondition that is not met is a typed outcome
//!   (see [`crate::auth::outcome`]), not an error;
//! - an operation on an entity that must exist fails with
//!   [`AuthError::NoSuchEntity`].
//!
//! Storage and notification failures are passed through unchanged and map to
//! [`StatusCode::InternalServerError`].

use std::time::Duration;

use thiserror::Error;

use crate::auth::outcome::StatusCode;

/// Errors that can occur in account and authorization handling.
#[derive(Debug, Error)]
pub enum AuthError {
    /// An account for this realm and user id already exists.
    #[error("account exists")]
    AccountExists,

    /// The entity the operation requires does not exist.
    #[error("entity does not exist")]
    NoSuchEntity,

    /// No token was supplied.
    #[error("no token provided")]
    NoToken,

    /// A first token exchange was attempted without a scope.
    #[error("no scope provided")]
    NoScope,

    /// A required request field is missing or empty.
    #[error("invalid request: missing {0}")]
    InvalidRequest(&'static str),

    /// No unused client id could be generated.
    #[error("could not generate a unique client id after {0} attempts")]
    ClientIdExhausted(usize),

    /// An exact-match query returned more than one row.
    #[error("consistency check failed: {count} rows in {collection} for {filter}")]
    Inconsistent {
        collection: &'static str,
        filter: String,
        count: usize,
    },

    /// The storage call did not finish within the request deadline.
    #[error("storage deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// Error returned by the document store.
    #[error("storage error: {0}")]
    Storage(#[from] surrealdb::Error),

    /// Error returned by a challenge or token notifier.
    #[error("notification failed: {0}")]
    Notification(#[source] anyhow::Error),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for account and authorization operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Status an HTTP adapter should answer with for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoToken => StatusCode::Unauthorized,
            Self::NoScope | Self::InvalidRequest(_) => StatusCode::BadRequest,
            Self::AccountExists => StatusCode::Forbidden,
            Self::NoSuchEntity => StatusCode::NotFound,
            Self::ClientIdExhausted(_)
            | Self::Inconsistent { .. }
            | Self::DeadlineExceeded(_)
            | Self::Storage(_)
            | Self::Notification(_)
            | Self::Config(_) => StatusCode::InternalServerError,
        }
    }

    /// Whether the error comes from infrastructure rather than the request.
    pub fn is_internal(&self) -> bool {
        self.status() == StatusCode::InternalServerError
    }
}
