//! Newtype identifiers, mirroring `spark_core::ids::{CorrelationId, RequestId}`:
//! wrapping bare `String`/`Uuid` in domain-specific types catches
//! positional-argument mistakes at compile time instead of at a call site
//! three modules away.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }
    };
}

string_id!(ServiceName);
string_id!(InstanceId);
string_id!(ServiceId);
string_id!(RequestId);
string_id!(DecisionId);
string_id!(ApproverId);
string_id!(UserId);
string_id!(TeamId);
string_id!(GateName);

impl RequestId {
    /// Generates a fresh request identifier using a random UUIDv4, the
    /// convention used throughout the pack's service binaries.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl DecisionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_inner_string() {
        let id = ServiceName::from("svc-a");
        assert_eq!(id.to_string(), "svc-a");
        assert_eq!(id.as_str(), "svc-a");
    }

    #[test]
    fn generated_request_ids_are_unique() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert_ne!(a, b);
    }
}
