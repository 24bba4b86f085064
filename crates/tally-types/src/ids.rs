//! Type-safe identifier wrappers.
//!
//! Poll identifiers are opaque strings. New polls get a UUID v7 rendered as
//! text, but any non-empty string read back from the store is accepted so
//! that records written by other tools remain addressable. User identifiers
//! are supplied by callers (HTTP header, chat payload) and trusted as-is.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`String`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier string.
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is the empty string.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Return the inner [`String`].
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a poll. Immutable once assigned.
    PollId
}

define_id! {
    /// Caller-supplied identifier of a user (voter or poll creator).
    UserId
}

impl PollId {
    /// Create a fresh identifier using UUID v7 (time-ordered).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_uuids() {
        let a = PollId::generate();
        let b = PollId::generate();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn default_id_is_empty() {
        assert!(PollId::default().is_empty());
        assert!(!UserId::from("u1").is_empty());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = UserId::new("alice");
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, "\"alice\"");

        let back: Result<UserId, _> = serde_json::from_str("\"bob\"");
        assert_eq!(back.ok(), Some(UserId::new("bob")));
    }
}
