//! Permission evaluator: pure predicates over an acting user and the scope of
//! the entity being mutated.
//!
//! Every predicate applies the tenant check first (cross-organization access is
//! always denied, regardless of role) and defaults to deny. Call sites in the
//! mutation services must consult these before performing any side effect.

use std::collections::HashMap;

use crate::db::models::{OrgRole, ProjectRole};

/// The acting user as seen by the evaluator: organization-wide role plus the
/// sparse per-project membership overrides.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: String,
    pub organization_id: String,
    pub org_role: OrgRole,
    pub memberships: HashMap<String, ProjectRole>,
}

impl Actor {
    pub fn project_role(&self, project_id: &str) -> Option<ProjectRole> {
        self.memberships.get(project_id).copied()
    }

    fn in_org(&self, organization_id: &str) -> bool {
        self.organization_id == organization_id
    }

    fn is_project_maintainer(&self, project_id: &str) -> bool {
        self.project_role(project_id) == Some(ProjectRole::Maintainer)
    }
}

/// Scope of a project relevant to authorization.
#[derive(Debug, Clone)]
pub struct ProjectScope {
    pub id: String,
    pub organization_id: String,
}

/// Scope of a comment relevant to authorization.
#[derive(Debug, Clone)]
pub struct CommentScope {
    pub organization_id: String,
    pub author_id: String,
    pub author_role: OrgRole,
}

pub fn can_create_project(actor: &Actor, organization_id: &str) -> bool {
    actor.in_org(organization_id)
        && matches!(actor.org_role, OrgRole::Admin | OrgRole::OrgMaintainer)
}

pub fn can_edit_project(actor: &Actor, project: &ProjectScope) -> bool {
    actor.in_org(&project.organization_id)
        && (matches!(actor.org_role, OrgRole::Admin | OrgRole::OrgMaintainer)
            || actor.is_project_maintainer(&project.id))
}

pub fn can_delete_project(actor: &Actor, project: &ProjectScope) -> bool {
    actor.in_org(&project.organization_id) && actor.org_role == OrgRole::Admin
}

/// Project drag is an organization-wide structural change: a project
/// MAINTAINER may edit the project but not reorder the board globally.
pub fn can_reorder_projects(actor: &Actor, organization_id: &str) -> bool {
    actor.in_org(organization_id)
        && matches!(actor.org_role, OrgRole::Admin | OrgRole::OrgMaintainer)
}

/// Task create/edit/delete and task moves within a project all share the
/// project edit tier.
pub fn can_edit_tasks(actor: &Actor, project: &ProjectScope) -> bool {
    can_edit_project(actor, project)
}

/// Account and access management. ORG_MAINTAINER may manage accounts but never
/// act on ADMIN accounts.
pub fn can_manage_user(actor: &Actor, target_organization_id: &str, target_role: OrgRole) -> bool {
    if !actor.in_org(target_organization_id) {
        return false;
    }
    match actor.org_role {
        OrgRole::Admin => true,
        OrgRole::OrgMaintainer => target_role != OrgRole::Admin,
        OrgRole::Member => false,
    }
}

/// Commenting is open to org-level maintainers, any project member, and any
/// assignee of the task even without a project membership.
pub fn can_post_comment(actor: &Actor, project: &ProjectScope, assignee_ids: &[String]) -> bool {
    if !actor.in_org(&project.organization_id) {
        return false;
    }
    matches!(actor.org_role, OrgRole::Admin | OrgRole::OrgMaintainer)
        || actor.project_role(&project.id).is_some()
        || assignee_ids.iter().any(|id| *id == actor.user_id)
}

/// A comment may be deleted by its author, by an ADMIN, or by an
/// ORG_MAINTAINER unless the comment was authored by an ADMIN.
pub fn can_delete_comment(actor: &Actor, comment: &CommentScope) -> bool {
    if !actor.in_org(&comment.organization_id) {
        return false;
    }
    if comment.author_id == actor.user_id {
        return true;
    }
    match actor.org_role {
        OrgRole::Admin => true,
        OrgRole::OrgMaintainer => comment.author_role != OrgRole::Admin,
        OrgRole::Member => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORG: &str = "org-1";
    const OTHER_ORG: &str = "org-2";
    const PROJECT: &str = "proj-1";

    fn actor(org_role: OrgRole) -> Actor {
        Actor {
            user_id: "user-1".into(),
            organization_id: ORG.into(),
            org_role,
            memberships: HashMap::new(),
        }
    }

    fn actor_with_membership(org_role: OrgRole, role: ProjectRole) -> Actor {
        let mut a = actor(org_role);
        a.memberships.insert(PROJECT.into(), role);
        a
    }

    fn project() -> ProjectScope {
        ProjectScope {
            id: PROJECT.into(),
            organization_id: ORG.into(),
        }
    }

    fn foreign_project() -> ProjectScope {
        ProjectScope {
            id: "proj-9".into(),
            organization_id: OTHER_ORG.into(),
        }
    }

    #[test]
    fn project_creation_requires_org_level_role() {
        assert!(can_create_project(&actor(OrgRole::Admin), ORG));
        assert!(can_create_project(&actor(OrgRole::OrgMaintainer), ORG));
        assert!(!can_create_project(&actor(OrgRole::Member), ORG));
        assert!(!can_create_project(
            &actor_with_membership(OrgRole::Member, ProjectRole::Maintainer),
            ORG
        ));
    }

    #[test]
    fn project_deletion_is_admin_only() {
        assert!(can_delete_project(&actor(OrgRole::Admin), &project()));
        assert!(!can_delete_project(
            &actor(OrgRole::OrgMaintainer),
            &project()
        ));
        assert!(!can_delete_project(
            &actor_with_membership(OrgRole::Member, ProjectRole::Maintainer),
            &project()
        ));
    }

    #[test]
    fn project_maintainer_can_edit_but_not_reorder() {
        let maintainer = actor_with_membership(OrgRole::Member, ProjectRole::Maintainer);
        assert!(can_edit_project(&maintainer, &project()));
        assert!(!can_reorder_projects(&maintainer, ORG));
    }

    #[test]
    fn project_member_cannot_edit() {
        let member = actor_with_membership(OrgRole::Member, ProjectRole::Member);
        assert!(!can_edit_project(&member, &project()));
        assert!(!can_edit_tasks(&member, &project()));
    }

    #[test]
    fn denial_is_monotone_down_the_role_ladder() {
        // If a role is denied, every strictly weaker role is denied too.
        let ladder = [
            actor(OrgRole::Admin),
            actor(OrgRole::OrgMaintainer),
            actor_with_membership(OrgRole::Member, ProjectRole::Maintainer),
            actor_with_membership(OrgRole::Member, ProjectRole::Member),
            actor(OrgRole::Member),
        ];
        let checks: Vec<Box<dyn Fn(&Actor) -> bool>> = vec![
            Box::new(|a| can_create_project(a, ORG)),
            Box::new(|a| can_edit_project(a, &project())),
            Box::new(|a| can_delete_project(a, &project())),
            Box::new(|a| can_reorder_projects(a, ORG)),
            Box::new(|a| can_edit_tasks(a, &project())),
            Box::new(|a| can_post_comment(a, &project(), &[])),
        ];
        for check in &checks {
            let mut seen_denied = false;
            for role in &ladder {
                if seen_denied {
                    assert!(!check(role), "weaker role allowed after stronger denied");
                }
                if !check(role) {
                    seen_denied = true;
                }
            }
        }
    }

    #[test]
    fn cross_tenant_is_always_denied() {
        let admin = actor(OrgRole::Admin);
        assert!(!can_create_project(&admin, OTHER_ORG));
        assert!(!can_edit_project(&admin, &foreign_project()));
        assert!(!can_delete_project(&admin, &foreign_project()));
        assert!(!can_reorder_projects(&admin, OTHER_ORG));
        assert!(!can_manage_user(&admin, OTHER_ORG, OrgRole::Member));
        assert!(!can_post_comment(
            &admin,
            &foreign_project(),
            &["user-1".into()]
        ));
        assert!(!can_delete_comment(
            &admin,
            &CommentScope {
                organization_id: OTHER_ORG.into(),
                author_id: "user-1".into(),
                author_role: OrgRole::Member,
            }
        ));
    }

    #[test]
    fn org_maintainer_cannot_manage_admin_accounts() {
        let maintainer = actor(OrgRole::OrgMaintainer);
        assert!(can_manage_user(&maintainer, ORG, OrgRole::Member));
        assert!(can_manage_user(&maintainer, ORG, OrgRole::OrgMaintainer));
        assert!(!can_manage_user(&maintainer, ORG, OrgRole::Admin));
        assert!(can_manage_user(&actor(OrgRole::Admin), ORG, OrgRole::Admin));
        assert!(!can_manage_user(&actor(OrgRole::Member), ORG, OrgRole::Member));
    }

    #[test]
    fn assignee_may_comment_without_membership() {
        let plain = actor(OrgRole::Member);
        assert!(!can_post_comment(&plain, &project(), &[]));
        assert!(can_post_comment(&plain, &project(), &["user-1".into()]));
    }

    #[test]
    fn project_member_may_comment() {
        let member = actor_with_membership(OrgRole::Member, ProjectRole::Member);
        assert!(can_post_comment(&member, &project(), &[]));
    }

    #[test]
    fn comment_deletion_matrix() {
        let own = CommentScope {
            organization_id: ORG.into(),
            author_id: "user-1".into(),
            author_role: OrgRole::Member,
        };
        let by_member = CommentScope {
            organization_id: ORG.into(),
            author_id: "someone-else".into(),
            author_role: OrgRole::Member,
        };
        let by_admin = CommentScope {
            organization_id: ORG.into(),
            author_id: "someone-else".into(),
            author_role: OrgRole::Admin,
        };

        // Authors may always delete their own comment
        assert!(can_delete_comment(&actor(OrgRole::Member), &own));
        // Plain members may not delete others' comments
        assert!(!can_delete_comment(&actor(OrgRole::Member), &by_member));
        // Admin deletes anything
        assert!(can_delete_comment(&actor(OrgRole::Admin), &by_admin));
        // Org maintainer deletes anything except admin-authored comments
        assert!(can_delete_comment(&actor(OrgRole::OrgMaintainer), &by_member));
        assert!(!can_delete_comment(&actor(OrgRole::OrgMaintainer), &by_admin));
    }
}
