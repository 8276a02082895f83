//! Caller context threaded through every store and workflow call.
//!
//! There is no ambient session: the acting user, their team and their role
//! travel explicitly with each operation, and all team scoping derives from it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Actor name recorded on audit entries when the caller has no display name.
pub const DEFAULT_ACTOR: &str = "System";

/// Role of a team member
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Read-only access
    Viewer,
    /// Can create, edit, tag and link assets
    #[default]
    Member,
    /// Everything a member can do, plus deletes
    Admin,
}

impl Role {
    pub fn can_edit(&self) -> bool {
        *self >= Role::Member
    }

    pub fn can_delete(&self) -> bool {
        *self == Role::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Viewer => write!(f, "viewer"),
            Self::Member => write!(f, "member"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "viewer" => Ok(Self::Viewer),
            "member" => Ok(Self::Member),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Identity of the caller for one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamContext {
    pub user_id: Uuid,
    pub team_id: Uuid,
    pub role: Role,
    /// Display name written to the activity log
    pub actor_name: Option<String>,
}

impl TeamContext {
    pub fn new(user_id: Uuid, team_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            team_id,
            role,
            actor_name: None,
        }
    }

    /// Set the display name used for audit entries (builder pattern).
    pub fn with_actor_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.actor_name = if name.trim().is_empty() {
            None
        } else {
            Some(name)
        };
        self
    }

    /// Name recorded on audit entries, falling back to [`DEFAULT_ACTOR`].
    pub fn actor(&self) -> &str {
        self.actor_name.as_deref().unwrap_or(DEFAULT_ACTOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_gates() {
        assert!(!Role::Viewer.can_edit());
        assert!(Role::Member.can_edit());
        assert!(!Role::Member.can_delete());
        assert!(Role::Admin.can_edit());
        assert!(Role::Admin.can_delete());
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("viewer".parse::<Role>().unwrap(), Role::Viewer);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_actor_defaults_to_system() {
        let ctx = TeamContext::new(Uuid::new_v4(), Uuid::new_v4(), Role::Member);
        assert_eq!(ctx.actor(), "System");

        let ctx = ctx.with_actor_name("Ana");
        assert_eq!(ctx.actor(), "Ana");

        let ctx = ctx.with_actor_name("   ");
        assert_eq!(ctx.actor(), "System");
    }
}
