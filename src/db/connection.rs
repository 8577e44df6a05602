use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use tracing::debug;

pub type Db = Surreal<Any>;

/// Collection holding [`crate::account::Account`] records.
pub const ACCOUNTS: &str = "ACCOUNTS";

/// Collection holding [`crate::auth::Authorization`] records.
pub const AUTHORIZATIONS: &str = "AUTHORIZATIONS";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("REALM_AUTH_DB_URL")
                .unwrap_or_else(|_| "memory".to_string()),
            namespace: env::var("REALM_AUTH_DB_NAMESPACE")
                .unwrap_or_else(|_| "realm_auth".to_string()),
            database: env::var("REALM_AUTH_DB_DATABASE")
                .unwrap_or_else(|_| "identity".to_string()),
            username: env::var("REALM_AUTH_DB_USERNAME").ok(),
            password: env::var("REALM_AUTH_DB_PASSWORD").ok(),
        }
    }
}

impl DatabaseConfig {
    /// In-process database that lives as long as the connection.
    pub fn memory() -> Self {
        Self {
            url: "memory".to_string(),
            ..Default::default()
        }
    }
}

pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    debug!("Connecting to document store at {}", config.url);
    let db = surrealdb::engine::any::connect(config.url).await?;

    // Sign in if credentials are provided
    if let (Some(username), Some(password)) = (config.username, config.password) {
        db.signin(Root {
            username: &username,
            password: &password,
        })
        .await?;
    }

    db.use_ns(config.namespace).use_db(config.database).await?;

    Ok(db)
}

/// Define both collections and their lookup indexes.
///
/// Safe to run on every start; existing definitions are left alone.
pub async fn ensure_schema(db: &Db) -> Result<()> {
    let schema_queries = [
        // Accounts: one per (realm, user_id)
        "DEFINE TABLE IF NOT EXISTS ACCOUNTS SCHEMALESS;
         DEFINE INDEX IF NOT EXISTS accounts_realm_user ON TABLE ACCOUNTS COLUMNS realm, user_id UNIQUE;
         DEFINE INDEX IF NOT EXISTS accounts_token ON TABLE ACCOUNTS COLUMNS token;",

        // Authorizations: one per (realm, client_id), looked up by bearer token
        "DEFINE TABLE IF NOT EXISTS AUTHORIZATIONS SCHEMALESS;
         DEFINE INDEX IF NOT EXISTS authorizations_token ON TABLE AUTHORIZATIONS COLUMNS token;
         DEFINE INDEX IF NOT EXISTS authorizations_realm_user ON TABLE AUTHORIZATIONS COLUMNS realm, user_id;",
    ];

    for query in schema_queries {
        db.query(query).await?.check()?;
    }

    Ok(())
}
