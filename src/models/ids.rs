//! Strongly-typed, namespaced document identifiers
//!
//! Every entity id carries its entity-type prefix (`account::`, `category::`,
//! `txn::`, `line::`). The prefix is load-bearing: the storage layer lists a
//! given entity type by prefix scan rather than a separate type field.
//!
//! Generated ids embed a fixed-width hex millisecond timestamp followed by a
//! random UUID fragment, so lexicographic order equals creation order and
//! reverse-chronological listing needs no separate counter.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Error returned when an id string does not carry the expected prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParseError {
    pub expected_prefix: &'static str,
    pub input: String,
}

impl fmt::Display for IdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid id '{}': expected prefix '{}'",
            self.input, self.expected_prefix
        )
    }
}

impl std::error::Error for IdParseError {}

/// Process-wide sequence breaking ties between ids minted in the same
/// millisecond
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn generate_suffix() -> String {
    // 12 hex digits of millis keeps ids sortable until the year 10889; the
    // sequence keeps same-millisecond ids in mint order
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) & 0xffff;
    let entropy = Uuid::new_v4().simple().to_string();
    format!("{:012x}{:04x}-{}", millis, seq, &entropy[..8])
}

/// Macro to generate namespaced ID newtype wrappers
macro_rules! define_doc_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// The namespace prefix for this entity type
            pub const PREFIX: &'static str = $prefix;

            /// Generate a new time-ordered id
            pub fn generate() -> Self {
                Self(format!("{}{}", $prefix, generate_suffix()))
            }

            /// Build an id from a known suffix (used for fixed system docs)
            pub fn from_suffix(suffix: &str) -> Self {
                Self(format!("{}{}", $prefix, suffix))
            }

            /// Full id string including the prefix
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.starts_with($prefix) && s.len() > $prefix.len() {
                    Ok(Self(s.to_string()))
                } else {
                    Err(IdParseError {
                        expected_prefix: $prefix,
                        input: s.to_string(),
                    })
                }
            }
        }
    };
}

define_doc_id!(AccountId, "account::");
define_doc_id!(CategoryId, "category::");
define_doc_id!(TransactionId, "txn::");
define_doc_id!(LineId, "line::");
