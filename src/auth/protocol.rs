//! Token exchange protocol.
//!
//! Drives an account from its first login request to an active session:
//!
//! 1. `login_request` creates an unconfirmed account and sends a challenge
//!    (`ac.` token), or sends a temporary token (`tt.`) to a logged out
//!    account that was confirmed before.
//! 2. `confirm_challenge` consumes the challenge and marks the account as
//!    confirmed and logged out. `confirm_login` does the same and then sends
//!    a temporary token right away.
//! 3. `exchange_token` swaps the temporary token for a bearer
//!    authorization and activates the account.
//! 4. `logout` and `block` end the session and revoke the authorization.
//!
//! Account and authorization are written one after the other without a
//! transaction. A failure between the two writes leaves them out of step
//! until the next successful exchange or logout.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::account::{Account, AccountStatus, AccountStore};
use crate::auth::authorization::{AuthorizationRequest, AuthorizationStore};
use crate::auth::notifier::Notifier;
use crate::auth::outcome::{Access, ConfirmOutcome, ExchangeOutcome, LoginOutcome, LogoutOutcome};
use crate::auth::scope::{bearer_token, has_scope};
use crate::clock::{Clock, add_days};
use crate::config::AuthOptions;
use crate::db::Db;
use crate::error::{AuthError, AuthResult};
use crate::types::ClientId;
use crate::utils::{CHALLENGE_PREFIX, TEMPORARY_PREFIX, random_token};

/// Orchestrates account and authorization transitions.
pub struct TokenExchange {
    accounts: Arc<AccountStore>,
    authorizations: Arc<AuthorizationStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    options: AuthOptions,
}

impl TokenExchange {
    pub fn new(
        accounts: Arc<AccountStore>,
        authorizations: Arc<AuthorizationStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        options: AuthOptions,
    ) -> Self {
        Self {
            accounts,
            authorizations,
            notifier,
            clock,
            options,
        }
    }

    /// Build both stores on `db` using the cache and deadline settings in
    /// `options`.
    pub fn from_db(
        db: Db,
        options: AuthOptions,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> AuthResult<Self> {
        options.validate()?;

        let accounts = AccountStore::new(db.clone(), clock.clone())
            .with_cache_ttl(options.cache_ttl())
            .with_deadline(options.storage_deadline());
        let authorizations = AuthorizationStore::new(db, clock.clone())
            .with_cache_ttl(options.cache_ttl())
            .with_deadline(options.storage_deadline());

        Ok(Self::new(
            Arc::new(accounts),
            Arc::new(authorizations),
            notifier,
            clock,
            options,
        ))
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn authorizations(&self) -> &AuthorizationStore {
        &self.authorizations
    }

    pub fn options(&self) -> &AuthOptions {
        &self.options
    }

    /// Start a login for `(realm, user_id)`.
    pub async fn login_request(&self, realm: &str, user_id: &str) -> AuthResult<LoginOutcome> {
        AuthorizationRequest::new(realm, user_id).validate()?;
        let minutes = self.options.authentication_expiration;

        let Some(mut account) = self.accounts.find_account_by_user_id(realm, user_id).await? else {
            let account = self.accounts.create_account(realm, user_id, minutes).await?;
            self.send_challenge(&account).await?;
            return Ok(LoginOutcome::ChallengeSent(account));
        };

        if !account.is_confirmed() {
            self.accounts
                .reset_account_challenge(&mut account, minutes)
                .await?;
            self.send_challenge(&account).await?;
            info!("Renewed challenge for {}/{}", realm, user_id);
            return Ok(LoginOutcome::ChallengeSent(account));
        }

        if account.status != AccountStatus::LoggedOut {
            debug!(
                "Login for {}/{} rejected, account is {}",
                realm, user_id, account.status
            );
            return Ok(LoginOutcome::AlreadyAuthorized);
        }

        self.accounts
            .reset_temporary_token(&mut account, minutes)
            .await?;
        self.send_token(&account).await?;
        info!("Sent temporary token to {}/{}", realm, user_id);
        Ok(LoginOutcome::TokenSent(account))
    }

    /// Consume a challenge token.
    ///
    /// Only `ac.` tokens are accepted; a temporary token presented here is
    /// treated as unknown.
    pub async fn confirm_challenge(&self, token: &str) -> AuthResult<ConfirmOutcome> {
        if token.is_empty() {
            return Err(AuthError::NoToken);
        }
        if !token.starts_with(CHALLENGE_PREFIX) {
            return Ok(ConfirmOutcome::UnknownToken);
        }

        let Some(mut account) = self.accounts.find_account_by_token(token).await? else {
            warn!("Unknown challenge token");
            return Ok(ConfirmOutcome::UnknownToken);
        };

        let now = self.clock.now();
        if account.token_expired(now) {
            warn!(
                "Expired challenge for {}/{}",
                account.realm, account.user_id
            );
            return Ok(ConfirmOutcome::Expired);
        }

        account.confirmed = now;
        account.expires = 0;
        account.status = AccountStatus::LoggedOut;
        account.token.clear();
        self.accounts.update_account(&mut account).await?;

        info!("Confirmed account {}/{}", account.realm, account.user_id);
        Ok(ConfirmOutcome::Confirmed(account))
    }

    /// Consume a challenge token and send a temporary token right away.
    ///
    /// On success the outcome carries the location to redirect to.
    pub async fn confirm_login(&self, token: &str) -> AuthResult<ConfirmOutcome> {
        let mut account = match self.confirm_challenge(token).await? {
            ConfirmOutcome::Confirmed(account) => account,
            other => return Ok(other),
        };

        self.accounts
            .reset_temporary_token(&mut account, self.options.authentication_expiration)
            .await?;
        self.send_token(&account).await?;

        Ok(ConfirmOutcome::TokenSent {
            account,
            location: self.options.confirmed_url(),
        })
    }

    /// Swap a temporary token for a bearer authorization.
    ///
    /// An existing authorization keeps its scope and gets a new token. A new
    /// authorization takes the scope of `req`, which must be covered by the
    /// configured scope, and fails with [`AuthError::NoScope`] if there is
    /// none.
    pub async fn exchange_token(
        &self,
        req: &AuthorizationRequest,
        login_from: &str,
    ) -> AuthResult<ExchangeOutcome> {
        req.validate()?;
        if req.token.is_empty() {
            return Err(AuthError::NoToken);
        }

        let Some(mut account) = self
            .accounts
            .find_account_by_user_id(&req.realm, &req.user_id)
            .await?
        else {
            return Ok(ExchangeOutcome::NoSuchAccount);
        };

        let now = self.clock.now();
        if !req.token.starts_with(TEMPORARY_PREFIX)
            || account.token != req.token
            || account.token_expired(now)
        {
            warn!(
                "Token exchange for {}/{} rejected",
                req.realm, req.user_id
            );
            return Ok(ExchangeOutcome::InvalidToken);
        }

        let days = self.options.authorization_expiration;
        let mut auth = match self
            .authorizations
            .lookup_authorization(&account.realm, account.client_id.as_str())
            .await?
        {
            Some(auth) => auth,
            None => {
                if req.scope.trim().is_empty() {
                    return Err(AuthError::NoScope);
                }
                if !has_scope(&self.options.scope, &req.scope) {
                    warn!(
                        "Scope {} refused for {}/{}",
                        req.scope, req.realm, req.user_id
                    );
                    return Ok(ExchangeOutcome::ScopeNotAllowed);
                }
                let mut first = req.clone();
                first.client_id = account.client_id.clone();
                self.authorizations.new_authorization(&first, days)
            }
        };

        auth.token = random_token();
        auth.revoked = false;
        auth.expires = add_days(now, days);
        self.authorizations
            .create_or_update_authorization(&mut auth)
            .await?;

        account.status = AccountStatus::Active;
        account.last_login = now;
        account.login_count += 1;
        account.login_from = login_from.to_string();
        account.token.clear();
        account.expires = 0;
        self.accounts.update_account(&mut account).await?;

        info!(
            "Issued authorization for {}/{} (client {})",
            account.realm, account.user_id, account.client_id
        );
        Ok(ExchangeOutcome::Issued(auth))
    }

    /// End the session of an account and revoke its authorization.
    ///
    /// Fails with [`AuthError::NoSuchEntity`] if the account does not exist.
    pub async fn logout(&self, realm: &str, client_id: &str) -> AuthResult<LogoutOutcome> {
        let Some(mut account) = self.accounts.lookup_account(realm, client_id).await? else {
            return Err(AuthError::NoSuchEntity);
        };

        if account.status.is_suspended() {
            debug!("Logout of {}.{} rejected, account is {}", realm, client_id, account.status);
            return Ok(LogoutOutcome::Forbidden);
        }

        account.status = AccountStatus::LoggedOut;
        self.accounts.update_account(&mut account).await?;
        self.revoke(realm, client_id).await?;

        info!("Logged out {}/{}", account.realm, account.user_id);
        Ok(LogoutOutcome::LoggedOut)
    }

    /// Block an account and revoke its authorization.
    ///
    /// Fails with [`AuthError::NoSuchEntity`] if the account does not exist.
    pub async fn block(&self, realm: &str, client_id: &str) -> AuthResult<Account> {
        let Some(mut account) = self.accounts.lookup_account(realm, client_id).await? else {
            return Err(AuthError::NoSuchEntity);
        };

        self.revoke(realm, client_id).await?;

        account.status = AccountStatus::Blocked;
        self.accounts.update_account(&mut account).await?;

        info!("Blocked {}/{}", account.realm, account.user_id);
        Ok(account)
    }

    async fn revoke(&self, realm: &str, client_id: &str) -> AuthResult<()> {
        if let Some(mut auth) = self
            .authorizations
            .lookup_authorization(realm, client_id)
            .await?
        {
            auth.revoked = true;
            self.authorizations
                .create_or_update_authorization(&mut auth)
                .await?;
        }
        Ok(())
    }

    /// Decide whether a bearer token grants `scope`.
    ///
    /// The authorization must be valid, its account active and its scope
    /// must contain every entry of `scope`.
    pub async fn check_authorization(&self, token: &str, scope: &str) -> AuthResult<Access> {
        if token.is_empty() {
            return Err(AuthError::NoToken);
        }

        let Some(auth) = self.authorizations.find_authorization_by_token(token).await? else {
            return Ok(Access::Denied);
        };
        if !auth.is_valid(self.clock.now()) {
            return Ok(Access::Denied);
        }

        let active = self
            .accounts
            .find_account_by_user_id(&auth.realm, &auth.user_id)
            .await?
            .map(|acc| acc.status == AccountStatus::Active)
            .unwrap_or(false);
        if !active {
            return Ok(Access::Denied);
        }

        if !has_scope(&auth.scope, scope) {
            debug!("Scope {} not granted to client {}", scope, auth.client_id);
            return Ok(Access::Denied);
        }

        Ok(Access::Granted(auth))
    }

    /// Same as [`Self::check_authorization`], reading the token from an
    /// `Authorization` header value.
    pub async fn check_bearer(&self, header: &str, scope: &str) -> AuthResult<Access> {
        let token = bearer_token(header).ok_or(AuthError::NoToken)?;
        self.check_authorization(token, scope).await
    }

    /// Client id of the authorization holding `token`, if any.
    pub async fn client_id_for_token(&self, token: &str) -> AuthResult<Option<ClientId>> {
        Ok(self
            .authorizations
            .find_authorization_by_token(token)
            .await?
            .map(|auth| auth.client_id))
    }

    async fn send_challenge(&self, account: &Account) -> AuthResult<()> {
        self.notifier
            .send_challenge(&account.realm, &account.user_id, &account.token)
            .await
            .map_err(AuthError::Notification)
    }

    async fn send_token(&self, account: &Account) -> AuthResult<()> {
        self.notifier
            .send_token(&account.realm, &account.user_id, &account.token)
            .await
            .map_err(AuthError::Notification)
    }
}
