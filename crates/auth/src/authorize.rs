use std::collections::HashSet;

use thiserror::Error;

use crate::Role;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: requires one of {required:?}")]
    Forbidden { required: Vec<String> },
}

/// Allow iff the presented roles intersect the required ones.
///
/// - No IO
/// - No panics
/// - Runs only on claims that already passed token verification
///
/// An empty `required` set never allows anything.
pub fn authorize(required: &[Role], presented: &[Role]) -> Result<(), AuthzError> {
    let presented: HashSet<&str> = presented.iter().map(|r| r.as_str()).collect();

    if required.iter().any(|r| presented.contains(r.as_str())) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden {
            required: required.iter().map(|r| r.as_str().to_string()).collect(),
        })
    }
}

/// A reusable "any of these roles" requirement attached to a route group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGate {
    required: Vec<Role>,
}

impl RoleGate {
    pub fn any_of<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        Self {
            required: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn required(&self) -> &[Role] {
        &self.required
    }

    pub fn check(&self, presented: &[Role]) -> Result<(), AuthzError> {
        authorize(&self.required, presented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roles(names: &[&str]) -> Vec<Role> {
        names.iter().map(|n| Role::from(*n)).collect()
    }

    #[test]
    fn admin_with_staff_is_allowed() {
        assert_eq!(authorize(&roles(&["admin"]), &roles(&["admin", "staff"])), Ok(()));
    }

    #[test]
    fn staff_alone_is_denied() {
        assert_eq!(
            authorize(&roles(&["admin"]), &roles(&["staff"])),
            Err(AuthzError::Forbidden {
                required: vec!["admin".to_string()]
            })
        );
    }

    #[test]
    fn no_presented_roles_is_denied() {
        assert!(authorize(&roles(&["backoffice"]), &[]).is_err());
    }

    #[test]
    fn empty_requirement_denies() {
        assert!(authorize(&[], &roles(&["admin"])).is_err());
    }

    #[test]
    fn gate_checks_any_of() {
        let gate = RoleGate::any_of(["backoffice", "admin"]);
        assert!(gate.check(&roles(&["admin"])).is_ok());
        assert!(gate.check(&roles(&["editor"])).is_err());
    }

    proptest! {
        /// Property: the decision equals "sets intersect".
        #[test]
        fn decision_matches_intersection(
            required in proptest::collection::hash_set("[a-d]", 0..4),
            presented in proptest::collection::hash_set("[a-d]", 0..4),
        ) {
            let req: Vec<Role> = required.iter().map(|s| Role::new(s.clone())).collect();
            let pre: Vec<Role> = presented.iter().map(|s| Role::new(s.clone())).collect();

            let intersects = required.intersection(&presented).next().is_some();
            prop_assert_eq!(authorize(&req, &pre).is_ok(), intersects);
        }
    }
}
