//! Who may touch which church and branch.
//!
//! Every handler turns the validated caller into a [`Viewer`] and resolves a
//! [`Scope`] before touching the database. Records outside the viewer's
//! church are reported as missing rather than forbidden.

pub mod sanitize;

pub use sanitize::{sanitize_user, visibility, Visibility};

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::auth::{self, Role};
use crate::services::ServiceError;

/// The caller as the access rules see them
#[derive(Debug, Clone, PartialEq)]
pub struct Viewer {
    pub id: Uuid,
    pub church_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub role: Role,
}

impl Viewer {
    pub fn require(&self, allowed: &[Role]) -> Result<(), ServiceError> {
        Ok(auth::require_role(self.role, allowed)?)
    }

    pub fn is_superadmin(&self) -> bool {
        self.role == Role::Superadmin
    }

    /// The viewer's church. Only superadmins lack one.
    pub fn own_church(&self) -> Result<Uuid, ServiceError> {
        self.church_id
            .ok_or_else(|| ServiceError::forbidden("Account is not attached to a church"))
    }

    pub fn can_reach_church(&self, church_id: Uuid) -> bool {
        self.is_superadmin() || self.church_id == Some(church_id)
    }

    /// Writes on branch-scoped rows: pastors with a branch stay inside it.
    pub fn can_write_branch(&self, church_id: Uuid, branch_id: Option<Uuid>) -> bool {
        if !self.can_reach_church(church_id) {
            return false;
        }
        match (self.role, self.branch_id) {
            (Role::Pastor, Some(own)) => branch_id == Some(own),
            _ => true,
        }
    }

    /// 404 for rows in another church, 403 for rows in another branch.
    pub fn ensure_writable(&self, what: &str, church_id: Uuid, branch_id: Option<Uuid>) -> Result<(), ServiceError> {
        if !self.can_reach_church(church_id) {
            return Err(ServiceError::not_found(format!("{} not found", what)));
        }
        if !self.can_write_branch(church_id, branch_id) {
            return Err(ServiceError::forbidden(format!("{} belongs to another branch", what)));
        }
        Ok(())
    }

    pub fn ensure_readable(&self, what: &str, church_id: Uuid) -> Result<(), ServiceError> {
        if self.can_reach_church(church_id) {
            Ok(())
        } else {
            Err(ServiceError::not_found(format!("{} not found", what)))
        }
    }
}

/// The church (and optional branch) a request operates on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scope {
    pub church_id: Uuid,
    pub branch_id: Option<Uuid>,
}

impl Scope {
    /// Superadmins must name a church; everyone else is pinned to their own and
    /// may not ask for another.
    pub fn resolve(
        viewer: &Viewer,
        requested_church: Option<Uuid>,
        requested_branch: Option<Uuid>,
    ) -> Result<Scope, ServiceError> {
        let church_id = if viewer.is_superadmin() {
            requested_church.ok_or_else(|| ServiceError::invalid("church_id", "church_id is required for superadmin requests"))?
        } else {
            let own = viewer.own_church()?;
            match requested_church {
                Some(other) if other != own => {
                    return Err(ServiceError::forbidden("Cannot access another church"));
                }
                _ => own,
            }
        };

        Ok(Scope {
            church_id,
            branch_id: requested_branch,
        })
    }

    /// Pastors attached to a branch only see that branch.
    pub fn confine_pastor(self, viewer: &Viewer) -> Result<Scope, ServiceError> {
        match (viewer.role, viewer.branch_id) {
            (Role::Pastor, Some(own)) => match self.branch_id {
                Some(requested) if requested != own => Err(ServiceError::forbidden("Cannot access another branch")),
                _ => Ok(Scope {
                    branch_id: Some(own),
                    ..self
                }),
            },
            _ => Ok(self),
        }
    }

    /// Filter where-object for this scope
    pub fn where_clause(&self) -> Map<String, Value> {
        let mut clause = Map::new();
        clause.insert("church_id".to_string(), json!(self.church_id));
        if let Some(branch_id) = self.branch_id {
            clause.insert("branch_id".to_string(), json!(branch_id));
        }
        clause
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewer(role: Role, church: Option<Uuid>, branch: Option<Uuid>) -> Viewer {
        Viewer {
            id: Uuid::new_v4(),
            church_id: church,
            branch_id: branch,
            role,
        }
    }

    #[test]
    fn superadmin_must_name_a_church() {
        let root = viewer(Role::Superadmin, None, None);
        assert!(matches!(Scope::resolve(&root, None, None), Err(ServiceError::Validation { .. })));

        let church = Uuid::new_v4();
        let scope = Scope::resolve(&root, Some(church), None).unwrap();
        assert_eq!(scope.church_id, church);
    }

    #[test]
    fn members_are_pinned_to_their_church() {
        let church = Uuid::new_v4();
        let member = viewer(Role::Member, Some(church), None);
        assert_eq!(Scope::resolve(&member, None, None).unwrap().church_id, church);
        assert_eq!(Scope::resolve(&member, Some(church), None).unwrap().church_id, church);
        assert!(matches!(
            Scope::resolve(&member, Some(Uuid::new_v4()), None),
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[test]
    fn pastors_are_confined_to_their_branch() {
        let church = Uuid::new_v4();
        let branch = Uuid::new_v4();
        let pastor = viewer(Role::Pastor, Some(church), Some(branch));

        let scope = Scope::resolve(&pastor, None, None).unwrap().confine_pastor(&pastor).unwrap();
        assert_eq!(scope.branch_id, Some(branch));

        let other = Scope::resolve(&pastor, None, Some(Uuid::new_v4())).unwrap();
        assert!(other.confine_pastor(&pastor).is_err());

        let bishop = viewer(Role::Bishop, Some(church), Some(branch));
        let scope = Scope::resolve(&bishop, None, None).unwrap().confine_pastor(&bishop).unwrap();
        assert_eq!(scope.branch_id, None);
    }

    #[test]
    fn where_clause_carries_scope() {
        let church = Uuid::new_v4();
        let branch = Uuid::new_v4();
        let clause = Scope { church_id: church, branch_id: Some(branch) }.where_clause();
        assert_eq!(clause["church_id"], json!(church));
        assert_eq!(clause["branch_id"], json!(branch));
    }

    #[test]
    fn foreign_rows_look_missing() {
        let pastor = viewer(Role::Pastor, Some(Uuid::new_v4()), Some(Uuid::new_v4()));
        let foreign = Uuid::new_v4();
        assert!(matches!(pastor.ensure_writable("Branch", foreign, None), Err(ServiceError::NotFound(_))));
        assert!(matches!(
            pastor.ensure_writable("Activity", pastor.church_id.unwrap(), Some(Uuid::new_v4())),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(pastor.ensure_writable("Activity", pastor.church_id.unwrap(), pastor.branch_id).is_ok());
    }
}
