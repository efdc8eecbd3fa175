//! Per-zone person identification policy.
//!
//! The string forms must match the `zones.operation_mode` CHECK constraint.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Person must be identified before any item in the batch may move.
pub const MODE_REQUIRE_PERSON: &str = "REQUIRE_PERSON";

/// Items may move without an identified person; loans carry no user.
pub const MODE_ALLOW_ANONYMOUS: &str = "ALLOW_ANONYMOUS";

/// How a zone treats batches that carry item tags but no person tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationMode {
    #[default]
    RequirePerson,
    AllowAnonymous,
}

impl OperationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationMode::RequirePerson => MODE_REQUIRE_PERSON,
            OperationMode::AllowAnonymous => MODE_ALLOW_ANONYMOUS,
        }
    }

    /// Resolve a zone's stored mode, falling back to `default` when the zone
    /// has none.
    pub fn resolve(stored: Option<&str>, default: OperationMode) -> Result<Self, CoreError> {
        match stored {
            Some(value) => value.parse(),
            None => Ok(default),
        }
    }
}

impl FromStr for OperationMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            MODE_REQUIRE_PERSON => Ok(OperationMode::RequirePerson),
            MODE_ALLOW_ANONYMOUS => Ok(OperationMode::AllowAnonymous),
            other => Err(CoreError::Validation(format!(
                "Unknown operation mode '{other}' (expected {MODE_REQUIRE_PERSON} or {MODE_ALLOW_ANONYMOUS})"
            ))),
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
