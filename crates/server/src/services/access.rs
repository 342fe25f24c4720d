//! Access management: organization signup, user accounts, and per-project
//! memberships. All mutations authorize through the permission evaluator.

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    board::permissions::{self, Actor},
    db::{
        models::{OrgRole, Organization, ProjectRole, User},
        Database,
    },
    error::{AppError, Result},
};

#[derive(Debug, Clone, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub organization_role: Option<OrgRole>,
}

#[derive(Clone)]
pub struct AccessService {
    db: Database,
}

fn forbidden(action: &str) -> AppError {
    AppError::Forbidden(format!("Not allowed to {action}"))
}

fn parse_org_role(raw: &str) -> Result<OrgRole> {
    raw.parse()
        .map_err(|_| AppError::Internal(format!("Unknown organization role: {raw}")))
}

impl AccessService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn pool(&self) -> &SqlitePool {
        &self.db.pool
    }

    /// Self-service signup: creates the organization and its ADMIN user.
    ///
    /// The identity row is written first and the organization second; if the
    /// organization insert fails (typically a name conflict racing the
    /// pre-check-free insert), the just-created identity is deleted again so no
    /// login-only orphan account remains.
    pub async fn register_organization(
        &self,
        organization_name: &str,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> Result<(Organization, User)> {
        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(self.pool())
            .await?;
        if existing > 0 {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let now = Utc::now().to_rfc3339();
        let user = User {
            id: Uuid::new_v4().to_string(),
            organization_id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            name: name.to_string(),
            organization_role: OrgRole::Admin,
            created_at: now.clone(),
        };

        sqlx::query(
            "INSERT INTO users (id, organization_id, email, name, password_hash, \
             organization_role, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.organization_id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(password_hash)
        .bind(user.organization_role.as_ref())
        .bind(&user.created_at)
        .execute(self.pool())
        .await?;

        let organization = Organization {
            id: user.organization_id.clone(),
            name: organization_name.to_string(),
            admin_user_id: user.id.clone(),
            created_at: now,
        };

        let inserted = sqlx::query(
            "INSERT INTO organizations (id, name, admin_user_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&organization.id)
        .bind(&organization.name)
        .bind(&organization.admin_user_id)
        .bind(&organization.created_at)
        .execute(self.pool())
        .await;

        if let Err(err) = inserted {
            let _ = sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(&user.id)
                .execute(self.pool())
                .await;

            let is_name_conflict = err
                .as_database_error()
                .map(|e| e.is_unique_violation())
                .unwrap_or(false);
            return if is_name_conflict {
                Err(AppError::Conflict(
                    "An organization with this name already exists".to_string(),
                ))
            } else {
                Err(err.into())
            };
        }

        Ok((organization, user))
    }

    pub async fn list_users(&self, actor: &Actor) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, (String, String, String, String, String, String)>(
            "SELECT id, organization_id, email, name, organization_role, created_at \
             FROM users WHERE organization_id = ? ORDER BY name ASC",
        )
        .bind(&actor.organization_id)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter()
            .map(|(id, organization_id, email, name, raw_role, created_at)| {
                Ok(User {
                    id,
                    organization_id,
                    email,
                    name,
                    organization_role: parse_org_role(&raw_role)?,
                    created_at,
                })
            })
            .collect()
    }

    pub async fn create_user(
        &self,
        actor: &Actor,
        email: &str,
        name: &str,
        password_hash: &str,
        organization_role: OrgRole,
    ) -> Result<User> {
        if !permissions::can_manage_user(actor, &actor.organization_id, organization_role) {
            return Err(forbidden("create this user"));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::Validation("Invalid email address".to_string()));
        }
        if name.trim().is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }

        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(self.pool())
            .await?;
        if existing > 0 {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            organization_id: actor.organization_id.clone(),
            email: email.to_string(),
            name: name.to_string(),
            organization_role,
            created_at: Utc::now().to_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO users (id, organization_id, email, name, password_hash, \
             organization_role, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.organization_id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(password_hash)
        .bind(user.organization_role.as_ref())
        .bind(&user.created_at)
        .execute(self.pool())
        .await?;

        Ok(user)
    }

    pub async fn update_user(
        &self,
        actor: &Actor,
        user_id: &str,
        update: UserUpdate,
    ) -> Result<()> {
        let target = self.fetch_user(user_id).await?;
        if !permissions::can_manage_user(actor, &target.organization_id, target.organization_role) {
            return Err(forbidden("manage this user"));
        }
        // Promoting someone to a role the actor could not manage is acting on
        // that role, so the new role is checked too.
        if let Some(new_role) = update.organization_role {
            if !permissions::can_manage_user(actor, &target.organization_id, new_role) {
                return Err(forbidden("assign this role"));
            }
        }

        let name = update.name.unwrap_or(target.name);
        if name.trim().is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }
        let role = update.organization_role.unwrap_or(target.organization_role);

        sqlx::query("UPDATE users SET name = ?, organization_role = ? WHERE id = ?")
            .bind(&name)
            .bind(role.as_ref())
            .bind(user_id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    /// Delete a user account. Their memberships are removed, they are
    /// unassigned from every task, and their comments are deleted with the
    /// per-task comment counts adjusted.
    pub async fn delete_user(&self, actor: &Actor, user_id: &str) -> Result<()> {
        let target = self.fetch_user(user_id).await?;
        if !permissions::can_manage_user(actor, &target.organization_id, target.organization_role) {
            return Err(forbidden("delete this user"));
        }
        if target.id == actor.user_id {
            return Err(AppError::Validation(
                "Cannot delete your own account".to_string(),
            ));
        }

        sqlx::query("DELETE FROM project_members WHERE user_id = ?")
            .bind(user_id)
            .execute(self.pool())
            .await?;

        self.unassign_everywhere(&target.organization_id, user_id)
            .await?;

        let counts = sqlx::query_as::<_, (String, i64)>(
            "SELECT task_id, COUNT(*) FROM comments WHERE user_id = ? GROUP BY task_id",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        for (task_id, count) in counts {
            sqlx::query("UPDATE tasks SET comment_count = comment_count - ? WHERE id = ?")
                .bind(count)
                .bind(&task_id)
                .execute(self.pool())
                .await?;
        }
        sqlx::query("DELETE FROM comments WHERE user_id = ?")
            .bind(user_id)
            .execute(self.pool())
            .await?;

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    /// Grant or change a user's role on a project. Memberships are part of the
    /// project's "maintainers" surface, so the project edit tier governs them.
    pub async fn set_membership(
        &self,
        actor: &Actor,
        project_id: &str,
        user_id: &str,
        role: ProjectRole,
    ) -> Result<()> {
        let scope = self.project_scope(actor, project_id).await?;
        if !permissions::can_edit_project(actor, &scope) {
            return Err(forbidden("manage members of this project"));
        }

        let target = self.fetch_user(user_id).await?;
        // Memberships may only reference projects of the member's own org
        if target.organization_id != scope.organization_id {
            return Err(AppError::Validation(
                "User is not part of this organization".to_string(),
            ));
        }

        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM project_members WHERE project_id = ? AND user_id = ?",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        if existing > 0 {
            sqlx::query("UPDATE project_members SET role = ? WHERE project_id = ? AND user_id = ?")
                .bind(role.as_ref())
                .bind(project_id)
                .bind(user_id)
                .execute(self.pool())
                .await?;
        } else {
            sqlx::query("INSERT INTO project_members (project_id, user_id, role) VALUES (?, ?, ?)")
                .bind(project_id)
                .bind(user_id)
                .bind(role.as_ref())
                .execute(self.pool())
                .await?;
        }

        Ok(())
    }

    pub async fn remove_membership(
        &self,
        actor: &Actor,
        project_id: &str,
        user_id: &str,
    ) -> Result<()> {
        let scope = self.project_scope(actor, project_id).await?;
        // Members may always remove themselves
        if user_id != actor.user_id && !permissions::can_edit_project(actor, &scope) {
            return Err(forbidden("manage members of this project"));
        }

        sqlx::query("DELETE FROM project_members WHERE project_id = ? AND user_id = ?")
            .bind(project_id)
            .bind(user_id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    pub async fn list_memberships(
        &self,
        actor: &Actor,
        project_id: &str,
    ) -> Result<Vec<(User, ProjectRole)>> {
        let _ = self.project_scope(actor, project_id).await?;

        let rows = sqlx::query_as::<_, (String, String, String, String, String, String, String)>(
            "SELECT u.id, u.organization_id, u.email, u.name, u.organization_role, u.created_at, \
             pm.role \
             FROM project_members pm JOIN users u ON pm.user_id = u.id \
             WHERE pm.project_id = ? ORDER BY u.name ASC",
        )
        .bind(project_id)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter()
            .map(
                |(id, organization_id, email, name, raw_role, created_at, raw_member_role)| {
                    let user = User {
                        id,
                        organization_id,
                        email,
                        name,
                        organization_role: parse_org_role(&raw_role)?,
                        created_at,
                    };
                    let role = raw_member_role
                        .parse()
                        .map_err(|_| AppError::Internal("Unknown project role".to_string()))?;
                    Ok((user, role))
                },
            )
            .collect()
    }

    async fn fetch_user(&self, user_id: &str) -> Result<User> {
        let row = sqlx::query_as::<_, (String, String, String, String, String, String)>(
            "SELECT id, organization_id, email, name, organization_role, created_at \
             FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let (id, organization_id, email, name, raw_role, created_at) = row;
        Ok(User {
            id,
            organization_id,
            email,
            name,
            organization_role: parse_org_role(&raw_role)?,
            created_at,
        })
    }

    async fn project_scope(
        &self,
        actor: &Actor,
        project_id: &str,
    ) -> Result<permissions::ProjectScope> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT id, organization_id FROM projects WHERE id = ?",
        )
        .bind(project_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

        let scope = permissions::ProjectScope {
            id: row.0,
            organization_id: row.1,
        };
        if scope.organization_id != actor.organization_id {
            return Err(AppError::NotFound("Project not found".to_string()));
        }
        Ok(scope)
    }

    /// Strip the user from every assignee list in the organization.
    async fn unassign_everywhere(&self, organization_id: &str, user_id: &str) -> Result<()> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT id, assignee_ids FROM tasks WHERE project_id IN \
             (SELECT id FROM projects WHERE organization_id = ?) \
             AND assignee_ids LIKE ?",
        )
        .bind(organization_id)
        .bind(format!("%\"{user_id}\"%"))
        .fetch_all(self.pool())
        .await?;

        for (task_id, raw) in rows {
            let assignees: Vec<String> = serde_json::from_str(&raw)
                .map_err(|e| AppError::Internal(format!("Malformed id list: {e}")))?;
            let remaining: Vec<String> =
                assignees.into_iter().filter(|id| id != user_id).collect();
            sqlx::query("UPDATE tasks SET assignee_ids = ? WHERE id = ?")
                .bind(serde_json::to_string(&remaining).unwrap_or_else(|_| "[]".to_string()))
                .bind(&task_id)
                .execute(self.pool())
                .await?;
        }

        Ok(())
    }
}
