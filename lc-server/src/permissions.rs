//! Static permission matrix
//!
//! Maps (role, resource, action) to a grant. Unknown resources and actions
//! deny: access control fails closed, never open. Instance-level checks
//! (curriculum ownership, membership of the addressed team) stay in the
//! handlers; this matrix only answers the role-capability question.

use lc_common::access::{PermissionLookup, Role, SessionIdentity};

/// Role-capability matrix for the service
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissionMatrix;

impl PermissionLookup for PermissionMatrix {
    fn has_permission(&self, identity: &SessionIdentity, resource: &str, action: &str) -> bool {
        let role = identity.role;
        match (resource, action) {
            // Every authenticated user manages their own curricula
            ("curriculum", "create" | "read" | "update" | "delete") => true,
            ("curriculum", "moderate") => role == Role::Admin,

            ("team", "create") => true,
            ("team", "read") => true,
            ("team", "invite" | "settings") => {
                matches!(role, Role::TeamLeader | Role::Admin)
            }
            // Announcement posting additionally honors the team's
            // announcement_posting setting, checked by the handler
            ("team", "announce") => true,

            ("notification", "read" | "update") => true,

            ("admin", _) => role == Role::Admin,

            // Fail closed on anything unrecognized
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn identity(role: Role) -> SessionIdentity {
        SessionIdentity {
            user_id: Uuid::new_v4(),
            role,
            team_id: None,
        }
    }

    #[test]
    fn test_unknown_resource_denies() {
        let matrix = PermissionMatrix;
        assert!(!matrix.has_permission(&identity(Role::Admin), "nonsense", "read"));
        assert!(!matrix.has_permission(&identity(Role::Admin), "curriculum", "nonsense"));
    }

    #[test]
    fn test_moderation_is_admin_only() {
        let matrix = PermissionMatrix;
        assert!(matrix.has_permission(&identity(Role::Admin), "curriculum", "moderate"));
        assert!(!matrix.has_permission(&identity(Role::TeamLeader), "curriculum", "moderate"));
        assert!(!matrix.has_permission(&identity(Role::User), "curriculum", "moderate"));
    }

    #[test]
    fn test_team_invite_requires_leadership() {
        let matrix = PermissionMatrix;
        assert!(matrix.has_permission(&identity(Role::TeamLeader), "team", "invite"));
        assert!(matrix.has_permission(&identity(Role::Admin), "team", "invite"));
        assert!(!matrix.has_permission(&identity(Role::User), "team", "invite"));
    }
}
