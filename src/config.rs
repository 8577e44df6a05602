use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf, time::Duration};

use crate::error::{AuthError, AuthResult};

/// Scope granted on a first token exchange unless configured otherwise.
pub const DEFAULT_SCOPE: &str = "api:read,api:write";

/// Scope that marks an administrative authorization.
pub const SCOPE_API_ADMIN: &str = "api:admin";

/// Base URL used to build links in notifications.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080";

/// Lifetime of challenge and temporary tokens, in minutes.
pub const DEFAULT_AUTHENTICATION_EXPIRATION: i64 = 10;

/// Lifetime of a bearer authorization, in days.
pub const DEFAULT_AUTHORIZATION_EXPIRATION: i64 = 90;

/// Longest accepted challenge / temporary token lifetime (one week).
pub const MAX_AUTHENTICATION_EXPIRATION: i64 = 7 * 24 * 60;

/// Longest accepted bearer authorization lifetime (ten years).
pub const MAX_AUTHORIZATION_EXPIRATION: i64 = 10 * 365;

/// Options of the token exchange protocol and its stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthOptions {
    /// Scope assigned to new authorizations by the login flow.
    pub scope: String,
    /// Public base URL, used for confirmation links and redirects.
    pub endpoint: String,
    /// Challenge / temporary token lifetime in minutes.
    pub authentication_expiration: i64,
    /// Bearer authorization lifetime in days.
    pub authorization_expiration: i64,
    /// Lifetime of cached accounts and authorizations in seconds.
    pub cache_ttl_seconds: u64,
    /// Upper bound for a single storage call in seconds.
    pub storage_deadline_seconds: u64,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            scope: DEFAULT_SCOPE.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            authentication_expiration: DEFAULT_AUTHENTICATION_EXPIRATION,
            authorization_expiration: DEFAULT_AUTHORIZATION_EXPIRATION,
            cache_ttl_seconds: crate::loader::DEFAULT_TTL.as_secs(),
            storage_deadline_seconds: crate::db::DEFAULT_DEADLINE.as_secs(),
        }
    }
}

impl AuthOptions {
    /// Defaults overridden by `REALM_AUTH_*` environment variables.
    ///
    /// Unparseable numbers fall back to the default value.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            scope: env::var("REALM_AUTH_SCOPE").unwrap_or(defaults.scope),
            endpoint: env::var("REALM_AUTH_ENDPOINT").unwrap_or(defaults.endpoint),
            authentication_expiration: env_number(
                "REALM_AUTH_CHALLENGE_MINUTES",
                defaults.authentication_expiration,
            ),
            authorization_expiration: env_number(
                "REALM_AUTH_AUTHORIZATION_DAYS",
                defaults.authorization_expiration,
            ),
            cache_ttl_seconds: env_number("REALM_AUTH_CACHE_TTL", defaults.cache_ttl_seconds),
            storage_deadline_seconds: env_number(
                "REALM_AUTH_STORAGE_DEADLINE",
                defaults.storage_deadline_seconds,
            ),
        }
    }

    /// Read options from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| AuthError::Config(format!("{}: {}", path.display(), e)))?;
        let options: AuthOptions = serde_json::from_str(&raw)
            .map_err(|e| AuthError::Config(format!("{}: {}", path.display(), e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Reject values the protocol cannot work with.
    pub fn validate(&self) -> AuthResult<()> {
        if self.scope.trim().is_empty() {
            return Err(AuthError::Config("scope must not be empty".to_string()));
        }
        if self.authentication_expiration <= 0 {
            return Err(AuthError::Config(
                "authentication_expiration must be positive".to_string(),
            ));
        }
        if self.authentication_expiration > MAX_AUTHENTICATION_EXPIRATION {
            return Err(AuthError::Config(format!(
                "authentication_expiration must be at most {} minutes",
                MAX_AUTHENTICATION_EXPIRATION
            )));
        }
        if self.authorization_expiration <= 0 {
            return Err(AuthError::Config(
                "authorization_expiration must be positive".to_string(),
            ));
        }
        if self.authorization_expiration > MAX_AUTHORIZATION_EXPIRATION {
            return Err(AuthError::Config(format!(
                "authorization_expiration must be at most {} days",
                MAX_AUTHORIZATION_EXPIRATION
            )));
        }
        if self.storage_deadline_seconds == 0 {
            return Err(AuthError::Config(
                "storage_deadline_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn storage_deadline(&self) -> Duration {
        Duration::from_secs(self.storage_deadline_seconds)
    }

    /// Where the login flow redirects after a confirmed challenge.
    pub fn confirmed_url(&self) -> String {
        format!("{}/confirmed", self.endpoint.trim_end_matches('/'))
    }
}

fn env_number<N: std::str::FromStr>(name: &str, default: N) -> N {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Locate the options file: `REALM_AUTH_CONFIG`, then `./realm-auth.json`.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(p) = env::var("REALM_AUTH_CONFIG") {
        return Some(PathBuf::from(p));
    }

    let candidate = PathBuf::from("realm-auth.json");
    if candidate.exists() {
        return Some(candidate);
    }

    None
}

/// Options from the resolved file if there is one, else from the environment.
pub fn load_options() -> AuthResult<AuthOptions> {
    match resolve_config_path() {
        Some(path) => AuthOptions::load(path),
        None => {
            let options = AuthOptions::from_env();
            options.validate()?;
            Ok(options)
        }
    }
}
