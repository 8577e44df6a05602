//! NewType wrappers for identifiers that are easy to mix up.
//!
//! A client id and a storage key are both plain strings on the wire, but
//! passing one where the other is expected silently addresses the wrong
//! record. These wrappers keep them apart at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }

            /// Whether the wrapped string is empty.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

newtype_string!(
    /// Server-generated opaque identifier of an account/authorization pair.
    ///
    /// Unique within a realm. It is the second half of the storage key and
    /// is never chosen by the caller.
    ClientId
);

newtype_string!(
    /// Storage key of an entity inside its collection, `"{realm}.{client_id}"`.
    ///
    /// Also used as the primary cache key, so a read and the invalidation
    /// that follows a write always address the same cache slot.
    NativeKey
);

impl NativeKey {
    /// Build the composite key for a realm and client id.
    pub fn compose(realm: &str, client_id: &str) -> Self {
        Self(named_key(realm, client_id))
    }
}

/// Join two key parts with the `.` separator used for every composite key.
pub fn named_key(part1: &str, part2: &str) -> String {
    format!("{}.{}", part1, part2)
}
