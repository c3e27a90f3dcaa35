//! Strongly-typed identifiers.
//!
//! All IDs are validated at construction time and implement common traits.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to define a strongly-typed ID newtype wrapper.
///
/// Generates: struct, `from_string()`, `as_str()`, Display, Serialize, Deserialize.
/// Optionally generates `new()` (UUID v4) and `Default` if `uuid` flag is passed.
macro_rules! define_id {
    ($name:ident, uuid) => {
        define_id!($name);

        impl $name {
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn from_string(s: String) -> Result<Self, &'static str> {
                if s.is_empty() {
                    return Err(concat!(stringify!($name), " cannot be empty"));
                }
                Ok(Self(s))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// Name of a peer module whose hosts are pushed to the child.
define_id!(ModuleName);
// One spawned child process; a restart gets a fresh id.
define_id!(InstanceId, uuid);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_module_name_rejected() {
        assert!(ModuleName::from_string(String::new()).is_err());
        let name = ModuleName::from_string("auth".to_string()).unwrap();
        assert_eq!(name.as_str(), "auth");
        assert_eq!(name.to_string(), "auth");
    }

    #[test]
    fn test_instance_ids_are_unique() {
        assert_ne!(InstanceId::new(), InstanceId::new());
    }
}
