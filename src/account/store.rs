//! Account storage with a cached primary key and a cached user id index.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::{Account, AccountStatus};
use crate::clock::{Clock, add_minutes};
use crate::db::{ACCOUNTS, Db, DocumentStore};
use crate::error::{AuthError, AuthResult};
use crate::loader::{DEFAULT_TTL, Loader};
use crate::types::{ClientId, NativeKey, named_key};
use crate::utils::{challenge_token, short_id, temporary_token};

/// Upper bound of the unique client id search in [`AccountStore::create_account`].
pub const MAX_CLIENT_ID_ATTEMPTS: usize = 16;

/// Account store backed by the `ACCOUNTS` collection.
///
/// Reads by primary key go through `accounts`. Reads by user id first
/// resolve the storage key through `user_ids` and then read through
/// `accounts`. Writes invalidate the primary entry after the write; the
/// user id mapping only changes when an account is deleted.
pub struct AccountStore {
    docs: DocumentStore<Account>,
    accounts: Loader<Account>,
    user_ids: Loader<NativeKey>,
    clock: Arc<dyn Clock>,
}

impl AccountStore {
    pub fn new(db: Db, clock: Arc<dyn Clock>) -> Self {
        Self {
            docs: DocumentStore::new(db, ACCOUNTS),
            accounts: Loader::new("account", DEFAULT_TTL),
            user_ids: Loader::new("account_user_id", DEFAULT_TTL),
            clock,
        }
    }

    /// Replace both caches with empty ones using `ttl`.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.accounts = Loader::new("account", ttl);
        self.user_ids = Loader::new("account_user_id", ttl);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.docs = self.docs.with_deadline(deadline);
        self
    }

    /// Create an unconfirmed account with a fresh challenge token.
    ///
    /// Fails with [`AuthError::AccountExists`] if the user id is taken in
    /// this realm.
    pub async fn create_account(
        &self,
        realm: &str,
        user_id: &str,
        challenge_minutes: i64,
    ) -> AuthResult<Account> {
        if realm.is_empty() {
            return Err(AuthError::InvalidRequest("realm"));
        }
        if user_id.is_empty() {
            return Err(AuthError::InvalidRequest("user_id"));
        }
        if self.find_account_by_user_id(realm, user_id).await?.is_some() {
            return Err(AuthError::AccountExists);
        }

        let client_id = self.unique_client_id(realm).await?;
        let now = self.clock.now();

        let account = Account {
            realm: realm.to_string(),
            user_id: user_id.to_string(),
            client_id,
            status: AccountStatus::Unconfirmed,
            token: challenge_token(),
            expires: add_minutes(now, challenge_minutes),
            confirmed: 0,
            last_login: 0,
            login_count: 0,
            login_from: String::new(),
            created: now,
            updated: now,
        };

        self.write(&account).await?;
        info!("Created account {} for {}/{}", account.client_id, realm, user_id);
        Ok(account)
    }

    async fn unique_client_id(&self, realm: &str) -> AuthResult<ClientId> {
        for _ in 0..MAX_CLIENT_ID_ATTEMPTS {
            let candidate = short_id();
            let key = NativeKey::compose(realm, &candidate);
            if self.docs.get(&key).await?.is_none() {
                return Ok(ClientId::new(candidate));
            }
            debug!("Client id {} already taken in {}", candidate, realm);
        }
        Err(AuthError::ClientIdExhausted(MAX_CLIENT_ID_ATTEMPTS))
    }

    /// Cached read by `(realm, client_id)`.
    pub async fn lookup_account(&self, realm: &str, client_id: &str) -> AuthResult<Option<Account>> {
        self.lookup_key(&NativeKey::compose(realm, client_id)).await
    }

    async fn lookup_key(&self, key: &NativeKey) -> AuthResult<Option<Account>> {
        self.accounts
            .load(key.as_str(), || self.docs.get(key))
            .await
    }

    /// Cached read by `(realm, user_id)`.
    pub async fn find_account_by_user_id(
        &self,
        realm: &str,
        user_id: &str,
    ) -> AuthResult<Option<Account>> {
        let index_key = named_key(realm, user_id);
        let key = self
            .user_ids
            .load(&index_key, move || async move {
                let found = self
                    .docs
                    .find_one(&[("realm", realm), ("user_id", user_id)])
                    .await?;
                Ok::<_, AuthError>(found.map(|acc| acc.key()))
            })
            .await?;

        let Some(key) = key else {
            return Ok(None);
        };

        let account = self.lookup_key(&key).await?;
        if account.is_none() {
            // Mapping points at a record that is gone.
            self.user_ids.invalidate(&index_key).await;
        }
        Ok(account)
    }

    /// Uncached read by the pending challenge or temporary token.
    pub async fn find_account_by_token(&self, token: &str) -> AuthResult<Option<Account>> {
        if token.is_empty() {
            return Ok(None);
        }
        self.docs.find_one(&[("token", token)]).await
    }

    /// Persist `account` and drop its cached copy.
    pub async fn update_account(&self, account: &mut Account) -> AuthResult<()> {
        account.updated = self.clock.now();
        self.write(account).await
    }

    async fn write(&self, account: &Account) -> AuthResult<()> {
        let key = account.key();
        self.docs.put(&key, account).await?;
        self.accounts.invalidate(key.as_str()).await;
        Ok(())
    }

    /// Issue a new confirmation challenge and put the account back to
    /// unconfirmed.
    pub async fn reset_account_challenge(
        &self,
        account: &mut Account,
        minutes: i64,
    ) -> AuthResult<()> {
        account.token = challenge_token();
        account.expires = add_minutes(self.clock.now(), minutes);
        account.status = AccountStatus::Unconfirmed;
        self.update_account(account).await
    }

    /// Issue a temporary token that can be exchanged for an authorization.
    pub async fn reset_temporary_token(&self, account: &mut Account, minutes: i64) -> AuthResult<()> {
        account.token = temporary_token();
        account.expires = add_minutes(self.clock.now(), minutes);
        account.status = AccountStatus::LoggedOut;
        self.update_account(account).await
    }

    /// Remove an account. Fails with [`AuthError::NoSuchEntity`] if absent.
    pub async fn delete_account(&self, realm: &str, client_id: &str) -> AuthResult<Account> {
        let key = NativeKey::compose(realm, client_id);
        let removed = self.docs.delete(&key).await?;
        self.accounts.invalidate(key.as_str()).await;

        let account = removed.ok_or(AuthError::NoSuchEntity)?;
        self.user_ids
            .invalidate(&named_key(&account.realm, &account.user_id))
            .await;
        info!("Deleted account {}", key);
        Ok(account)
    }

    /// Primary key cache, exposed for statistics.
    pub fn cache(&self) -> &Loader<Account> {
        &self.accounts
    }

    /// User id to primary key index cache.
    pub fn user_id_cache(&self) -> &Loader<NativeKey> {
        &self.user_ids
    }
}
