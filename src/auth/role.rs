//! # Role Model
//!
//! The authorization lattice shared by every protocol branch.
//!
//! `Visitor < Reader < Editor < Administrator`. Reader and Editor are
//! siblings for most checks; endpoints that need "either of" use a
//! [`RoleSet`] instead of a threshold.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::AuthError;

/// Ordered trust level of a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Unauthenticated or degraded caller
    Visitor,
    /// May read, never mutate
    Reader,
    /// May read and mutate content
    Editor,
    /// Full control, including administrative protocol branches
    Administrator,
}

impl Role {
    /// Every role, least privileged first
    pub const ALL: [Role; 4] = [
        Role::Visitor,
        Role::Reader,
        Role::Editor,
        Role::Administrator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Visitor => "visitor",
            Role::Reader => "reader",
            Role::Editor => "editor",
            Role::Administrator => "administrator",
        }
    }

    /// Roles allowed to issue mutating commands
    pub fn can_write(&self) -> bool {
        matches!(self, Role::Editor | Role::Administrator)
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "visitor" => Ok(Role::Visitor),
            "reader" => Ok(Role::Reader),
            "editor" => Ok(Role::Editor),
            "administrator" | "admin" => Ok(Role::Administrator),
            other => Err(AuthError::UnknownRole(other.to_string())),
        }
    }
}

/// A set of roles accepted by an endpoint
///
/// Stored as a bitmask so sets are `Copy` and usable in `const` route tables.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoleSet(u8);

impl RoleSet {
    /// Every role, including `Visitor`
    pub const ANY: RoleSet = RoleSet::of(&Role::ALL);

    /// Administrative protocol branches
    pub const ADMINISTRATOR: RoleSet = RoleSet::of(&[Role::Administrator]);

    /// Any authenticated caller
    pub const AUTHENTICATED: RoleSet =
        RoleSet::of(&[Role::Administrator, Role::Editor, Role::Reader]);

    /// Callers allowed to mutate content
    pub const WRITERS: RoleSet = RoleSet::of(&[Role::Administrator, Role::Editor]);

    pub const EMPTY: RoleSet = RoleSet(0);

    /// Build a set from a list of roles
    pub const fn of(roles: &[Role]) -> Self {
        let mut bits = 0u8;
        let mut i = 0;
        while i < roles.len() {
            bits |= roles[i].bit();
            i += 1;
        }
        RoleSet(bits)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }

    pub fn with(self, role: Role) -> Self {
        RoleSet(self.0 | role.bit())
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterate members, least privileged first
    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        Role::ALL.into_iter().filter(move |r| self.contains(*r))
    }
}

impl fmt::Debug for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.roles()).finish()
    }
}
