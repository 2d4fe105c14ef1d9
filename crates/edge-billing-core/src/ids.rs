//! Identifier types for edge-billing.
//!
//! Account identifiers come from the application's own database. Customer,
//! subscription and plan identifiers are opaque strings minted by the billing
//! provider (`cus_...`, `sub_...`, `price_...` for Stripe).
//!
//! # Macro-based ID Types
//!
//! The `string_id_type!` macro keeps serialization, parsing and display
//! consistent across every identifier newtype.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Characters that would let an identifier escape its URL path segment.
const RESERVED_CHARS: [char; 4] = ['/', '?', '#', '%'];

/// Longest identifier accepted. Stripe caps metadata values at 500 characters
/// and account ids are stored there.
pub const MAX_ID_LEN: usize = 500;

/// Macro to define a string-backed identifier type with standard trait implementations.
///
/// This macro generates a newtype wrapper around `String` with implementations for:
/// - `Clone`, `PartialEq`, `Eq`, `Hash`
/// - `Serialize`, `Deserialize` (as string, validated)
/// - `FromStr`, `Display`, `Debug`
/// - `TryFrom<String>`, `Into<String>`
/// - `AsRef<str>`
///
/// # Example
///
/// ```ignore
/// string_id_type!(MyId, "A custom identifier type.");
/// let id: MyId = "abc".parse().unwrap();
/// assert_eq!(id.as_str(), "abc");
/// ```
macro_rules! string_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier, rejecting blank or oversized input.
            ///
            /// # Errors
            ///
            /// Returns [`IdError`] if the value is empty after trimming, longer
            /// than [`MAX_ID_LEN`], a dot segment, or contains a path delimiter
            /// or control character.
            pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
                let value = value.into();
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(IdError::Empty);
                }
                if trimmed.len() > MAX_ID_LEN {
                    return Err(IdError::TooLong { max: MAX_ID_LEN });
                }
                check_path_safe(trimmed)?;
                if trimmed.len() == value.len() {
                    Ok(Self(value))
                } else {
                    Ok(Self(trimmed.to_string()))
                }
            }

            /// Return the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Identifiers are interpolated into provider URL paths.
fn check_path_safe(value: &str) -> Result<(), IdError> {
    if value == "." || value == ".." {
        return Err(IdError::DotSegment);
    }
    match value
        .chars()
        .find(|c| RESERVED_CHARS.contains(c) || c.is_control())
    {
        Some(ch) => Err(IdError::InvalidCharacter { ch }),
        None => Ok(()),
    }
}

string_id_type!(AccountId, "An internal account (tenant) identifier.\n\nEvery customer, subscription and checkout session created upstream is tagged with it.");
string_id_type!(CustomerId, "A billing-provider customer identifier.");
string_id_type!(SubscriptionId, "A billing-provider subscription identifier.");
string_id_type!(PlanId, "A billing-provider plan or price identifier.");

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is empty or whitespace.
    #[error("identifier is empty")]
    Empty,

    /// The input exceeds the maximum identifier length.
    #[error("identifier exceeds {max} characters")]
    TooLong {
        /// Maximum accepted length.
        max: usize,
    },

    /// The input is `.` or `..`.
    #[error("identifier cannot be a dot segment")]
    DotSegment,

    /// The input contains a path delimiter or control character.
    #[error("identifier contains invalid character {ch:?}")]
    InvalidCharacter {
        /// The offending character.
        ch: char,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_parses() {
        let id: AccountId = "acct_1".parse().unwrap();
        assert_eq!(id.as_str(), "acct_1");
        assert_eq!(id.to_string(), "acct_1");
    }

    #[test]
    fn blank_ids_are_rejected() {
        assert_eq!(AccountId::new(""), Err(IdError::Empty));
        assert_eq!(CustomerId::new("   "), Err(IdError::Empty));
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let id = CustomerId::new(" cus_123 ").unwrap();
        assert_eq!(id.as_str(), "cus_123");
    }

    #[test]
    fn oversized_ids_are_rejected() {
        let long = "a".repeat(MAX_ID_LEN + 1);
        assert_eq!(
            PlanId::new(long),
            Err(IdError::TooLong { max: MAX_ID_LEN })
        );
    }

    #[test]
    fn path_delimiters_are_rejected() {
        assert_eq!(
            CustomerId::new("cus_1/../../v1/charges"),
            Err(IdError::InvalidCharacter { ch: '/' })
        );
        assert_eq!(
            SubscriptionId::new("sub_1?expand[]=customer"),
            Err(IdError::InvalidCharacter { ch: '?' })
        );
        assert_eq!(
            CustomerId::new("cus_1%2F"),
            Err(IdError::InvalidCharacter { ch: '%' })
        );
        assert_eq!(CustomerId::new(".."), Err(IdError::DotSegment));
        assert!(CustomerId::new("cus_a.b").is_ok());
    }

    #[test]
    fn deserialization_validates() {
        let parsed: SubscriptionId = serde_json::from_str("\"sub_1\"").unwrap();
        assert_eq!(parsed.as_str(), "sub_1");

        let err = serde_json::from_str::<SubscriptionId>("\"\"");
        assert!(err.is_err());
    }

    #[test]
    fn debug_names_the_type() {
        let id = AccountId::new("acct_9").unwrap();
        assert_eq!(format!("{id:?}"), "AccountId(acct_9)");
    }
}
