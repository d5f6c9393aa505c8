// Roles and route capability sets
// Access rules are expressed as a RoleSet per route group instead of being
// encoded into URL paths. Pending admins hold no capabilities until activated.

use serde::{Deserialize, Serialize};

/// Account role, stored on the user row and carried in session claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    /// Registered as admin but not yet activated; cannot access anything
    PendingAdmin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::PendingAdmin => "pending_admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            "pending_admin" => Some(Role::PendingAdmin),
            "super_admin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }

    /// Capability bit for this role; pending admins hold none
    fn bit(&self) -> u8 {
        match self {
            Role::SuperAdmin => 0b100,
            Role::Admin => 0b010,
            Role::User => 0b001,
            Role::PendingAdmin => 0b000,
        }
    }

    /// Admins and the super-admin bypass subscription eligibility checks
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

/// Set of roles allowed to reach a route group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSet(u8);

impl RoleSet {
    pub const USER_ONLY: RoleSet = RoleSet(0b001);
    pub const ADMIN_ONLY: RoleSet = RoleSet(0b010);
    pub const SUPER_ADMIN_ONLY: RoleSet = RoleSet(0b100);
    pub const MEMBERS: RoleSet = RoleSet(0b011); // users and admins

    pub fn allows(&self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }
}

/// The authenticated principal, attached to the request by the auth middleware
#[derive(Debug, Clone)]
pub enum AuthenticatedUser {
    /// The configuration-defined super-admin; has no user row
    SuperAdmin,
    Registered { user_id: i32, role: Role },
}

impl AuthenticatedUser {
    pub fn role(&self) -> Role {
        match self {
            AuthenticatedUser::SuperAdmin => Role::SuperAdmin,
            AuthenticatedUser::Registered { role, .. } => *role,
        }
    }

    /// Database user id; None for the super-admin principal
    pub fn user_id(&self) -> Option<i32> {
        match self {
            AuthenticatedUser::SuperAdmin => None,
            AuthenticatedUser::Registered { user_id, .. } => Some(*user_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_strings() {
        for role in [Role::User, Role::Admin, Role::PendingAdmin, Role::SuperAdmin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("owner"), None);
    }

    #[test]
    fn test_role_sets_gate_by_capability() {
        assert!(RoleSet::USER_ONLY.allows(Role::User));
        assert!(!RoleSet::USER_ONLY.allows(Role::Admin));
        assert!(!RoleSet::USER_ONLY.allows(Role::SuperAdmin));

        assert!(RoleSet::ADMIN_ONLY.allows(Role::Admin));
        assert!(!RoleSet::ADMIN_ONLY.allows(Role::User));

        assert!(RoleSet::MEMBERS.allows(Role::User));
        assert!(RoleSet::MEMBERS.allows(Role::Admin));
        assert!(!RoleSet::MEMBERS.allows(Role::SuperAdmin));

        assert!(RoleSet::SUPER_ADMIN_ONLY.allows(Role::SuperAdmin));
        assert!(!RoleSet::SUPER_ADMIN_ONLY.allows(Role::Admin));
    }

    #[test]
    fn test_pending_admin_is_allowed_nowhere() {
        for set in [
            RoleSet::USER_ONLY,
            RoleSet::ADMIN_ONLY,
            RoleSet::SUPER_ADMIN_ONLY,
            RoleSet::MEMBERS,
        ] {
            assert!(!set.allows(Role::PendingAdmin));
        }
    }

    #[test]
    fn test_elevated_roles() {
        assert!(Role::Admin.is_elevated());
        assert!(Role::SuperAdmin.is_elevated());
        assert!(!Role::User.is_elevated());
        assert!(!Role::PendingAdmin.is_elevated());
    }
}
