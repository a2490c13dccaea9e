//! Strongly typed identifiers for rules and admin rules.
//!
//! # Purpose
//! Wraps store-assigned numeric identifiers so rule and admin-rule ids cannot
//! be mixed up when they travel through events and cached answers.
//!
//! # Key invariants
//! - Ids are assigned by a store, never by callers.
//! - Ordering follows the numeric value; stores use it for cursor paging.
//!
//! # Examples
//! ```rust
//! use geoacl_authz::RuleId;
//!
//! let id: RuleId = "42".parse().expect("id");
//! assert_eq!(id.as_u64(), 42);
//! assert_eq!(id.to_string(), "42");
//! ```
use crate::{AuthzError, AuthzResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            pub fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = AuthzError;

            fn from_str(input: &str) -> AuthzResult<Self> {
                // Keep the raw input in the error for callers that echo it back.
                input
                    .trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| AuthzError::InvalidId(input.into()))
            }
        }
    };
}

id_type!(
    /// Identity of a [`Rule`](crate::Rule) inside its store.
    RuleId
);
id_type!(
    /// Identity of an [`AdminRule`](crate::AdminRule) inside its store.
    AdminRuleId
);
