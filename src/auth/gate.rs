//! # Authorization Gate
//!
//! The single accept/reject check every branch consumes: is the caller's
//! role a member of the endpoint's accepted set?

use super::role::{Role, RoleSet};

/// True iff `role` is a member of `required`
pub fn authorize(role: Role, required: RoleSet) -> bool {
    required.contains(role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_membership_not_threshold() {
        let public_link = RoleSet::of(&[Role::Reader, Role::Visitor]);
        assert!(authorize(Role::Visitor, public_link));
        assert!(authorize(Role::Reader, public_link));
        // Membership, not ordering: a more privileged role is not implied
        assert!(!authorize(Role::Editor, public_link));
    }

    #[test]
    fn test_admin_branches() {
        for role in Role::ALL {
            assert_eq!(
                authorize(role, RoleSet::ADMINISTRATOR),
                role == Role::Administrator
            );
        }
    }

    #[test]
    fn test_empty_set_rejects_everyone() {
        for role in Role::ALL {
            assert!(!authorize(role, RoleSet::EMPTY));
        }
    }
}
