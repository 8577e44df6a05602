//! Accounts, challenge tokens and scoped bearer authorizations for
//! multi-tenant services.

// Core modules
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod loader;
pub mod types;
pub mod utils;

// Entities and protocol
pub mod account;
pub mod auth;

// Re-export key types and functions
pub use account::{Account, AccountStatus, AccountStore};
pub use auth::{
    Access, Authorization, AuthorizationRequest, AuthorizationStore, ConfirmOutcome,
    ExchangeOutcome, LogNotifier, LoginOutcome, LogoutOutcome, Notifier, RecordingNotifier,
    StatusCode, TokenExchange, TokenType, WebhookNotifier,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthOptions, load_options};
pub use db::{DatabaseConfig, Db, create_connection, ensure_schema};
pub use error::{AuthError, AuthResult};
pub use loader::Loader;
pub use types::{ClientId, NativeKey};

use std::sync::Arc;

use anyhow::Result;

/// Connect, make sure the schema exists and build the protocol on top.
pub async fn create_exchange(
    db_config: DatabaseConfig,
    options: AuthOptions,
    notifier: Arc<dyn Notifier>,
) -> Result<TokenExchange> {
    let db = create_connection(db_config).await?;
    ensure_schema(&db).await?;
    let exchange = TokenExchange::from_db(db, options, notifier, Arc::new(SystemClock))?;
    Ok(exchange)
}
