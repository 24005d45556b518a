//! Role-based access control
//!
//! # Architecture
//!
//! Access decisions are a pure function of the current session identity and
//! a declarative requirement supplied by the caller. Three requirement
//! shapes exist: unrestricted, an allowed-role set, and a named
//! resource/action permission resolved through a [`PermissionLookup`].
//!
//! This module contains ONLY pure functions and types. No HTTP framework
//! dependencies (Axum, etc.) - those live in the server crate.
//!
//! # Decision Rules
//!
//! - Absent identity is always denied, regardless of requirement shape.
//! - Permission lookups fail closed: a lookup that cannot answer denies.
//! - Decisions are recomputed on every call; nothing is cached across
//!   identity changes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ========================================
// Identity
// ========================================

/// User role, ordered least to most privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    TeamLeader,
    Admin,
}

impl Role {
    /// Parse from the database representation
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "team_leader" => Some(Role::TeamLeader),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Database representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::TeamLeader => "team_leader",
            Role::Admin => "admin",
        }
    }
}

/// The authenticated identity attached to a session
///
/// Owned by the auth layer; read-only everywhere else. Lifecycle is bound
/// to login/logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub user_id: Uuid,
    pub role: Role,
    pub team_id: Option<Uuid>,
}

// ========================================
// Requirements
// ========================================

/// A declarative access requirement, constructed per check
///
/// Exactly one shape applies to any given check. Callers that historically
/// supplied both a role list and a resource/action pair go through
/// [`AccessRequirement::from_parts`], which resolves the overlap
/// explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRequirement {
    /// Any authenticated identity is allowed
    Unrestricted,
    /// Allowed iff the identity's role is a member of the set
    Roles(Vec<Role>),
    /// Delegated to a [`PermissionLookup`] by resource and action
    Permission { resource: String, action: String },
}

impl AccessRequirement {
    /// Build a requirement from optional role and permission parts
    ///
    /// When both parts are present the permission check wins. That
    /// precedence is a deliberate, pinned decision (see the regression
    /// test below): role lists are coarse defaults, resource/action pairs
    /// are the more specific constraint.
    pub fn from_parts(
        roles: Option<Vec<Role>>,
        permission: Option<(String, String)>,
    ) -> AccessRequirement {
        match (roles, permission) {
            (_, Some((resource, action))) => AccessRequirement::Permission { resource, action },
            (Some(roles), None) => AccessRequirement::Roles(roles),
            (None, None) => AccessRequirement::Unrestricted,
        }
    }
}

/// Resolved access decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

// ========================================
// Permission lookup
// ========================================

/// Resolves a (identity, resource, action) triple to a boolean
///
/// Implementations must be pure and side-effect free. A lookup that cannot
/// answer (unknown resource, unknown action) must return `false`: access
/// control fails closed, never open.
pub trait PermissionLookup {
    fn has_permission(&self, identity: &SessionIdentity, resource: &str, action: &str) -> bool;
}

// ========================================
// Evaluation
// ========================================

/// Evaluate an access requirement against an optional identity
///
/// Pure and synchronous. The decision must be recomputed whenever the
/// identity or requirement changes; callers must not cache it across
/// identity changes.
///
/// # Rules
///
/// 1. Absent identity denies, regardless of requirement shape.
/// 2. `Unrestricted` allows any authenticated identity.
/// 3. `Roles(set)` allows iff the identity's role is in the set.
/// 4. `Permission` delegates to the lookup (fail-closed by the lookup's
///    own contract).
pub fn evaluate_access(
    identity: Option<&SessionIdentity>,
    requirement: &AccessRequirement,
    lookup: &dyn PermissionLookup,
) -> AccessDecision {
    let Some(identity) = identity else {
        return AccessDecision::Deny;
    };

    match requirement {
        AccessRequirement::Unrestricted => AccessDecision::Allow,
        AccessRequirement::Roles(roles) => {
            if roles.contains(&identity.role) {
                AccessDecision::Allow
            } else {
                AccessDecision::Deny
            }
        }
        AccessRequirement::Permission { resource, action } => {
            if lookup.has_permission(identity, resource, action) {
                AccessDecision::Allow
            } else {
                AccessDecision::Deny
            }
        }
    }
}

// ========================================
// Tests
// ========================================
