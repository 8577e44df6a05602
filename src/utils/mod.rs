// Identifier and token generation.
//
// Tokens are random opaque strings, not signed credentials. Their only
// property is that they are hard to guess and practically unique.

use uuid::Uuid;

/// Prefix of a challenge token that confirms a new account.
pub const CHALLENGE_PREFIX: &str = "ac.";

/// Prefix of a temporary token that is swapped for a bearer token.
pub const TEMPORARY_PREFIX: &str = "tt.";

/// Length of the ids returned by [`short_id`].
pub const SHORT_ID_LEN: usize = 16;

/// A fresh random opaque token (32 hex characters).
pub fn random_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A shorter random id, used for client ids and transient tokens.
pub fn short_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(SHORT_ID_LEN);
    id
}

/// A new account-confirmation challenge (`ac.` prefix).
pub fn challenge_token() -> String {
    format!("{}{}", CHALLENGE_PREFIX, short_id())
}

/// A new temporary auth-swap token (`tt.` prefix).
pub fn temporary_token() -> String {
    format!("{}{}", TEMPORARY_PREFIX, short_id())
}
