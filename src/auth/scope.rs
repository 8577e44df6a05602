//! Scope matching and bearer header parsing.
//!
//! A scope is a comma-separated set of capability strings such as
//! `"api:read,api:write"`. Matching is exact membership on the trimmed
//! entries: `"api:reading"` does not grant `"api:read"`.

/// Iterate the non-empty, trimmed entries of a scope string.
pub fn scope_entries(scope: &str) -> impl Iterator<Item = &str> {
    scope.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Whether `granted` contains every entry of `requested`.
///
/// Empty input on either side is never satisfied.
pub fn has_scope(granted: &str, requested: &str) -> bool {
    let mut wanted = scope_entries(requested).peekable();
    if wanted.peek().is_none() {
        return false;
    }
    wanted.all(|w| scope_entries(granted).any(|g| g == w))
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively. Returns `None` for any other
/// scheme or an empty token.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}
