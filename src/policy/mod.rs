//! Role-scoped access control
//!
//! Every entity handler asks this module one question - "what may this
//! caller do, and over which villages?" - instead of re-implementing role
//! conditionals per route. The engine answers with a [`Decision`] carrying a
//! visibility filter; handlers translate that filter into a storage query.

pub mod engine;
pub mod scope;

pub use engine::{authorize, Decision, EntityKind, Operation, VillageFilter};
pub use scope::{resolve_scope, ResolvedScope};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Caller role, carried in token claims and stored on the identity record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Resident of a single village; submits reports and SOS signals
    #[default]
    Villager,
    /// Village administrator; manages one village's data
    Head,
    /// Cross-village viewer with an explicitly assigned village set
    Super,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Villager => write!(f, "villager"),
            Role::Head => write!(f, "head"),
            Role::Super => write!(f, "super"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "villager" => Ok(Role::Villager),
            "head" => Ok(Role::Head),
            "super" => Ok(Role::Super),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [Role::Villager, Role::Head, Role::Super] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert!("admin".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Super).unwrap(), "\"super\"");
        let role: Role = serde_json::from_str("\"head\"").unwrap();
        assert_eq!(role, Role::Head);
    }
}
