//! Bearer authorizations and their store.
//!
//! There is at most one authorization per `(realm, client_id)`. It is
//! created on the first successful token exchange, rotated on every later
//! one and revoked on logout or block. Only an explicit delete removes it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::scope::has_scope;
use crate::clock::{Clock, add_days};
use crate::config::SCOPE_API_ADMIN;
use crate::db::{AUTHORIZATIONS, Db, DocumentStore};
use crate::error::{AuthError, AuthResult};
use crate::loader::{DEFAULT_TTL, Loader};
use crate::types::{ClientId, NativeKey};
use crate::utils::random_token;

/// Kind of principal an authorization was issued to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    #[default]
    User,
    App,
    Api,
    Bot,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::User => "user",
            Self::App => "app",
            Self::Api => "api",
            Self::Bot => "bot",
        };
        write!(f, "{}", s)
    }
}

/// Login or exchange request from a user, app or bot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub realm: String,
    pub user_id: String,
    #[serde(default)]
    pub client_id: ClientId,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub scope: String,
}

impl AuthorizationRequest {
    pub fn new(realm: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Fails with [`AuthError::InvalidRequest`] if realm or user id is empty.
    pub fn validate(&self) -> AuthResult<()> {
        if self.realm.is_empty() {
            return Err(AuthError::InvalidRequest("realm"));
        }
        if self.user_id.is_empty() {
            return Err(AuthError::InvalidRequest("user_id"));
        }
        Ok(())
    }
}

/// Scoped bearer credential of one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authorization {
    pub realm: String,
    pub client_id: ClientId,
    pub user_id: String,
    pub token: String,
    #[serde(default)]
    pub token_type: TokenType,
    pub scope: String,
    /// Unix seconds, `0` means never.
    #[serde(default)]
    pub expires: i64,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub updated: i64,
}

impl Authorization {
    /// Fresh authorization for `req` with a new token, valid for `days`.
    pub fn new(req: &AuthorizationRequest, days: i64, now: i64) -> Self {
        Self {
            realm: req.realm.clone(),
            client_id: req.client_id.clone(),
            user_id: req.user_id.clone(),
            token: random_token(),
            token_type: TokenType::default(),
            scope: req.scope.clone(),
            expires: add_days(now, days),
            revoked: false,
            created: now,
            updated: now,
        }
    }

    pub fn key(&self) -> NativeKey {
        NativeKey::compose(&self.realm, self.client_id.as_str())
    }

    /// Not revoked and not expired at `now`.
    pub fn is_valid(&self, now: i64) -> bool {
        !self.revoked && (self.expires == 0 || self.expires >= now)
    }

    pub fn has_admin_scope(&self) -> bool {
        has_scope(&self.scope, SCOPE_API_ADMIN)
    }
}

/// Authorization store backed by the `AUTHORIZATIONS` collection.
///
/// Keeps two caches: one by storage key and one by bearer token. Every
/// write or delete drops the entries of both the previous and the current
/// token.
pub struct AuthorizationStore {
    docs: DocumentStore<Authorization>,
    authorizations: Loader<Authorization>,
    tokens: Loader<Authorization>,
    clock: Arc<dyn Clock>,
}

impl AuthorizationStore {
    pub fn new(db: Db, clock: Arc<dyn Clock>) -> Self {
        Self {
            docs: DocumentStore::new(db, AUTHORIZATIONS),
            authorizations: Loader::new("authorization", DEFAULT_TTL),
            tokens: Loader::new("authorization_token", DEFAULT_TTL),
            clock,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.authorizations = Loader::new("authorization", ttl);
        self.tokens = Loader::new("authorization_token", ttl);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.docs = self.docs.with_deadline(deadline);
        self
    }

    /// Build, but do not store, a new authorization.
    pub fn new_authorization(&self, req: &AuthorizationRequest, days: i64) -> Authorization {
        Authorization::new(req, days, self.clock.now())
    }

    /// Cached read by `(realm, client_id)`.
    pub async fn lookup_authorization(
        &self,
        realm: &str,
        client_id: &str,
    ) -> AuthResult<Option<Authorization>> {
        let key = NativeKey::compose(realm, client_id);
        self.authorizations
            .load(key.as_str(), || self.docs.get(&key))
            .await
    }

    /// Cached read by bearer token.
    pub async fn find_authorization_by_token(
        &self,
        token: &str,
    ) -> AuthResult<Option<Authorization>> {
        if token.is_empty() {
            return Ok(None);
        }
        self.tokens
            .load(token, move || async move {
                self.docs.find_one(&[("token", token)]).await
            })
            .await
    }

    /// Overwrite the stored authorization with `auth`.
    ///
    /// Callers that want partial updates read, modify and write back.
    pub async fn create_or_update_authorization(&self, auth: &mut Authorization) -> AuthResult<()> {
        let key = auth.key();
        let previous = self.docs.get(&key).await?;

        auth.updated = self.clock.now();
        self.docs.put(&key, auth).await?;

        self.authorizations.invalidate(key.as_str()).await;
        if let Some(prev) = previous {
            self.tokens.invalidate(&prev.token).await;
        }
        self.tokens.invalidate(&auth.token).await;
        Ok(())
    }

    /// Remove an authorization and return it.
    ///
    /// Fails with [`AuthError::NoSuchEntity`] if there is none.
    pub async fn delete_authorization(
        &self,
        realm: &str,
        client_id: &str,
    ) -> AuthResult<Authorization> {
        let key = NativeKey::compose(realm, client_id);
        let removed = self.docs.delete(&key).await?;
        self.authorizations.invalidate(key.as_str()).await;

        let auth = removed.ok_or(AuthError::NoSuchEntity)?;
        self.tokens.invalidate(&auth.token).await;
        info!("Deleted authorization {}", key);
        Ok(auth)
    }

    /// Primary key cache, exposed for statistics.
    pub fn cache(&self) -> &Loader<Authorization> {
        &self.authorizations
    }

    /// Bearer token cache.
    pub fn token_cache(&self) -> &Loader<Authorization> {
        &self.tokens
    }
}
