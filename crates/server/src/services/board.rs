//! Board mutation service: the single entry point for every project/task/
//! comment mutation. Each operation authorizes through the permission
//! evaluator, plans order changes through the ordering module, persists them,
//! and leaves the caller to refetch the rebuilt snapshot.

use std::collections::HashMap;

use chrono::Utc;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    board::{
        ordering::{self, OrderWrite},
        permissions::{self, Actor, CommentScope, ProjectScope},
        reconcile::{self, BoardMutation, DragGesture, DragOutcome},
        snapshot::{self, BoardSnapshot},
    },
    db::{
        models::{Comment, OrgRole, Project, ProjectRole, Task, TaskPriority, TaskStatus},
        Database,
    },
    error::{AppError, Result},
};

const TASK_COLUMNS: &str = "id, project_id, title, description, assignee_ids, eta, status, \
                            priority, tags, order_index, comment_count, created_at, updated_at";

type TaskRow = (
    String,         // id
    String,         // project_id
    String,         // title
    Option<String>, // description
    String,         // assignee_ids (JSON)
    Option<String>, // eta
    String,         // status
    String,         // priority
    String,         // tags (JSON)
    i64,            // order_index
    i64,            // comment_count
    String,         // created_at
    String,         // updated_at
);

type ProjectRow = (String, String, String, i64, String, String);

/// Fields accepted when creating a task.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub assignee_ids: Vec<String>,
    pub eta: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial task update. Ordering and project assignment are excluded on
/// purpose: those change only through the move operations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub assignee_ids: Option<Vec<String>>,
    pub eta: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DragStatus {
    Applied,
    Aborted,
    Rejected,
}

#[derive(Clone)]
pub struct BoardService {
    db: Database,
}

enum OrderTable {
    Projects,
    Tasks,
}

fn forbidden(action: &str) -> AppError {
    AppError::Forbidden(format!("Not allowed to {action}"))
}

fn parse_org_role(raw: &str) -> Result<OrgRole> {
    raw.parse()
        .map_err(|_| AppError::Internal(format!("Unknown organization role: {raw}")))
}

fn parse_project_role(raw: &str) -> Result<ProjectRole> {
    raw.parse()
        .map_err(|_| AppError::Internal(format!("Unknown project role: {raw}")))
}

fn parse_id_list(raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| AppError::Internal(format!("Malformed id list: {e}")))
}

fn encode_id_list(ids: &[String]) -> String {
    serde_json::to_string(ids).unwrap_or_else(|_| "[]".to_string())
}

fn task_from_row(row: TaskRow) -> Result<Task> {
    let (
        id,
        project_id,
        title,
        description,
        assignee_ids,
        eta,
        status,
        priority,
        tags,
        order_index,
        comment_count,
        created_at,
        updated_at,
    ) = row;

    Ok(Task {
        id,
        project_id,
        title,
        description,
        assignee_ids: parse_id_list(&assignee_ids)?,
        eta,
        status: status
            .parse()
            .map_err(|_| AppError::Internal(format!("Unknown task status: {status}")))?,
        priority: priority
            .parse()
            .map_err(|_| AppError::Internal(format!("Unknown task priority: {priority}")))?,
        tags: serde_json::from_str(&tags)
            .map_err(|e| AppError::Internal(format!("Malformed tag list: {e}")))?,
        order_index,
        comment_count,
        created_at,
        updated_at,
    })
}

fn project_from_row(row: ProjectRow) -> Project {
    let (id, organization_id, title, order_index, created_at, updated_at) = row;
    Project {
        id,
        organization_id,
        title,
        order_index,
        created_at,
        updated_at,
    }
}

impl BoardService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn pool(&self) -> &SqlitePool {
        &self.db.pool
    }

    /// Load the acting user with organization role and project memberships.
    pub async fn load_actor(&self, user_id: &str) -> Result<Actor> {
        let (organization_id, raw_role) = sqlx::query_as::<_, (String, String)>(
            "SELECT organization_id, organization_role FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT project_id, role FROM project_members WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        let mut memberships = HashMap::new();
        for (project_id, raw) in rows {
            memberships.insert(project_id, parse_project_role(&raw)?);
        }

        Ok(Actor {
            user_id: user_id.to_string(),
            organization_id,
            org_role: parse_org_role(&raw_role)?,
            memberships,
        })
    }

    /// Rebuild the full denormalized board view for the actor's organization.
    pub async fn snapshot(&self, actor: &Actor) -> Result<BoardSnapshot> {
        let projects = self.org_projects(&actor.organization_id).await?;

        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE project_id IN \
             (SELECT id FROM projects WHERE organization_id = ?) \
             ORDER BY project_id, order_index"
        ))
        .bind(&actor.organization_id)
        .fetch_all(self.pool())
        .await?;

        let tasks = rows
            .into_iter()
            .map(task_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(snapshot::build(projects, tasks))
    }

    pub async fn org_projects(&self, organization_id: &str) -> Result<Vec<Project>> {
        let rows = sqlx::query_as::<_, ProjectRow>(
            "SELECT id, organization_id, title, order_index, created_at, updated_at \
             FROM projects WHERE organization_id = ? ORDER BY order_index",
        )
        .bind(organization_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(project_from_row).collect())
    }

    pub async fn project_tasks(&self, actor: &Actor, project_id: &str) -> Result<Vec<Task>> {
        // Reads are organization-wide; the scope lookup enforces the tenant
        let _ = self.project_scope_for(actor, project_id).await?;

        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE project_id = ? ORDER BY order_index"
        ))
        .bind(project_id)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(task_from_row).collect()
    }

    pub async fn get_task(&self, actor: &Actor, task_id: &str) -> Result<Task> {
        let task = self.fetch_task(task_id).await?;
        let _ = self.project_scope_for(actor, &task.project_id).await?;
        Ok(task)
    }

    // ----- projects -----

    pub async fn create_project(&self, actor: &Actor, title: &str) -> Result<Project> {
        if title.trim().is_empty() {
            return Err(AppError::Validation("Project title is required".to_string()));
        }
        if !permissions::can_create_project(actor, &actor.organization_id) {
            return Err(forbidden("create projects"));
        }

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM projects WHERE organization_id = ?",
        )
        .bind(&actor.organization_id)
        .fetch_one(self.pool())
        .await?;

        let project = Project {
            id: Uuid::new_v4().to_string(),
            organization_id: actor.organization_id.clone(),
            title: title.to_string(),
            order_index: count,
            created_at: Utc::now().to_rfc3339(),
            updated_at: Utc::now().to_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO projects (id, organization_id, title, order_index, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&project.id)
        .bind(&project.organization_id)
        .bind(&project.title)
        .bind(project.order_index)
        .bind(&project.created_at)
        .bind(&project.updated_at)
        .execute(self.pool())
        .await?;

        Ok(project)
    }

    pub async fn update_project(&self, actor: &Actor, project_id: &str, title: &str) -> Result<()> {
        let scope = self.project_scope_raw(project_id).await?;
        if !permissions::can_edit_project(actor, &scope) {
            return Err(forbidden("edit this project"));
        }
        if title.trim().is_empty() {
            return Err(AppError::Validation("Project title is required".to_string()));
        }

        sqlx::query("UPDATE projects SET title = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(Utc::now().to_rfc3339())
            .bind(project_id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    /// Delete a project, cascading to its tasks and their comments as an
    /// explicit ordered sequence, then re-index the surviving projects so the
    /// dense permutation holds.
    pub async fn delete_project(&self, actor: &Actor, project_id: &str) -> Result<()> {
        let scope = self.project_scope_raw(project_id).await?;
        if !permissions::can_delete_project(actor, &scope) {
            return Err(forbidden("delete this project"));
        }

        let order = self.org_project_order(&scope.organization_id).await?;

        sqlx::query(
            "DELETE FROM comments WHERE task_id IN (SELECT id FROM tasks WHERE project_id = ?)",
        )
        .bind(project_id)
        .execute(self.pool())
        .await?;

        sqlx::query("DELETE FROM tasks WHERE project_id = ?")
            .bind(project_id)
            .execute(self.pool())
            .await?;

        sqlx::query("DELETE FROM project_members WHERE project_id = ?")
            .bind(project_id)
            .execute(self.pool())
            .await?;

        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(project_id)
            .execute(self.pool())
            .await?;

        if let Some(plan) = ordering::plan_remove(&order, project_id) {
            self.persist_order_writes(OrderTable::Projects, &plan.writes)
                .await?;
        }

        Ok(())
    }

    pub async fn move_project(&self, actor: &Actor, project_id: &str, to_index: usize) -> Result<bool> {
        let scope = self.project_scope_raw(project_id).await?;
        if !permissions::can_reorder_projects(actor, &scope.organization_id) {
            return Err(forbidden("reorder projects"));
        }

        let order = self.org_project_order(&scope.organization_id).await?;
        let plan = ordering::plan_move(&order, project_id, to_index)
            .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

        if plan.writes.is_empty() {
            return Ok(false);
        }

        self.persist_order_writes(OrderTable::Projects, &plan.writes)
            .await?;
        Ok(true)
    }

    // ----- tasks -----

    pub async fn create_task(&self, actor: &Actor, project_id: &str, fields: NewTask) -> Result<Task> {
        let scope = self.project_scope_raw(project_id).await?;
        if !permissions::can_edit_tasks(actor, &scope) {
            return Err(forbidden("create tasks in this project"));
        }
        if fields.title.trim().is_empty() {
            return Err(AppError::Validation("Task title is required".to_string()));
        }
        self.require_org_users(&scope.organization_id, &fields.assignee_ids)
            .await?;

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks WHERE project_id = ?")
            .bind(project_id)
            .fetch_one(self.pool())
            .await?;

        let task = Task {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            title: fields.title,
            description: fields.description,
            assignee_ids: fields.assignee_ids,
            eta: fields.eta,
            status: fields.status.unwrap_or(TaskStatus::Todo),
            priority: fields.priority.unwrap_or(TaskPriority::P2),
            tags: fields.tags,
            order_index: count,
            comment_count: 0,
            created_at: Utc::now().to_rfc3339(),
            updated_at: Utc::now().to_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO tasks (id, project_id, title, description, assignee_ids, eta, status, \
             priority, tags, order_index, comment_count, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&task.id)
        .bind(&task.project_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(encode_id_list(&task.assignee_ids))
        .bind(&task.eta)
        .bind(task.status.as_ref())
        .bind(task.priority.as_ref())
        .bind(encode_id_list(&task.tags))
        .bind(task.order_index)
        .bind(task.comment_count)
        .bind(&task.created_at)
        .bind(&task.updated_at)
        .execute(self.pool())
        .await?;

        Ok(task)
    }

    /// Update task fields. `order_index` and `project_id` are untouchable here;
    /// they change only through the move operations.
    pub async fn update_task(&self, actor: &Actor, task_id: &str, patch: TaskPatch) -> Result<Task> {
        let mut task = self.fetch_task(task_id).await?;
        let scope = self.project_scope_raw(&task.project_id).await?;
        if !permissions::can_edit_tasks(actor, &scope) {
            return Err(forbidden("edit this task"));
        }

        if let Some(title) = patch.title {
            if title.trim().is_empty() {
                return Err(AppError::Validation("Task title is required".to_string()));
            }
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(assignee_ids) = patch.assignee_ids {
            self.require_org_users(&scope.organization_id, &assignee_ids)
                .await?;
            task.assignee_ids = assignee_ids;
        }
        if let Some(eta) = patch.eta {
            task.eta = eta;
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(tags) = patch.tags {
            task.tags = tags;
        }
        task.updated_at = Utc::now().to_rfc3339();

        sqlx::query(
            "UPDATE tasks SET title = ?, description = ?, assignee_ids = ?, eta = ?, status = ?, \
             priority = ?, tags = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(encode_id_list(&task.assignee_ids))
        .bind(&task.eta)
        .bind(task.status.as_ref())
        .bind(task.priority.as_ref())
        .bind(encode_id_list(&task.tags))
        .bind(&task.updated_at)
        .bind(&task.id)
        .execute(self.pool())
        .await?;

        Ok(task)
    }

    pub async fn delete_task(&self, actor: &Actor, task_id: &str) -> Result<()> {
        let task = self.fetch_task(task_id).await?;
        let scope = self.project_scope_raw(&task.project_id).await?;
        if !permissions::can_edit_tasks(actor, &scope) {
            return Err(forbidden("delete this task"));
        }

        let order = self.project_task_order(&task.project_id).await?;

        sqlx::query("DELETE FROM comments WHERE task_id = ?")
            .bind(task_id)
            .execute(self.pool())
            .await?;

        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(task_id)
            .execute(self.pool())
            .await?;

        if let Some(plan) = ordering::plan_remove(&order, task_id) {
            self.persist_order_writes(OrderTable::Tasks, &plan.writes)
                .await?;
        }

        Ok(())
    }

    pub async fn move_task_within_project(
        &self,
        actor: &Actor,
        project_id: &str,
        task_id: &str,
        to_index: usize,
    ) -> Result<bool> {
        let scope = self.project_scope_raw(project_id).await?;
        if !permissions::can_edit_tasks(actor, &scope) {
            return Err(forbidden("reorder tasks in this project"));
        }

        let task = self.fetch_task(task_id).await?;
        if task.project_id != project_id {
            return Err(AppError::NotFound(
                "Task is no longer in this project".to_string(),
            ));
        }

        let order = self.project_task_order(project_id).await?;
        let plan = ordering::plan_move(&order, task_id, to_index)
            .ok_or_else(|| AppError::NotFound("Task not found".to_string()))?;

        if plan.writes.is_empty() {
            return Ok(false);
        }

        self.persist_order_writes(OrderTable::Tasks, &plan.writes)
            .await?;
        Ok(true)
    }

    /// Cross-column move: re-index the source list with the task removed and
    /// the destination list with it inserted, updating `project_id` in the same
    /// logical step. The two persists are not wrapped in a transaction; a
    /// partial failure surfaces the error and the client resynchronizes from a
    /// fresh snapshot.
    pub async fn move_task_between_projects(
        &self,
        actor: &Actor,
        from_project_id: &str,
        to_project_id: &str,
        task_id: &str,
        to_index: usize,
    ) -> Result<()> {
        if from_project_id == to_project_id {
            return Err(AppError::Validation(
                "Source and destination projects are the same".to_string(),
            ));
        }

        let from_scope = self.project_scope_raw(from_project_id).await?;
        let to_scope = self.project_scope_raw(to_project_id).await?;
        // Both ends must be editable: maintaining the source alone is not
        // enough to push a task into a project the actor cannot maintain.
        if !permissions::can_edit_tasks(actor, &from_scope)
            || !permissions::can_edit_tasks(actor, &to_scope)
        {
            return Err(forbidden("move tasks between these projects"));
        }

        let task = self.fetch_task(task_id).await?;
        if task.project_id != from_project_id {
            return Err(AppError::NotFound(
                "Task is no longer in the source project".to_string(),
            ));
        }

        let source_order = self.project_task_order(from_project_id).await?;
        let source_plan = ordering::plan_remove(&source_order, task_id)
            .ok_or_else(|| AppError::NotFound("Task not found".to_string()))?;

        let dest_order = self.project_task_order(to_project_id).await?;
        let dest_plan = ordering::plan_insert(&dest_order, task_id, to_index);

        let moved_index = dest_plan
            .writes
            .iter()
            .find(|w| w.id == task_id)
            .map(|w| w.order_index)
            .unwrap_or(0);

        sqlx::query("UPDATE tasks SET project_id = ?, order_index = ?, updated_at = ? WHERE id = ?")
            .bind(to_project_id)
            .bind(moved_index)
            .bind(Utc::now().to_rfc3339())
            .bind(task_id)
            .execute(self.pool())
            .await?;

        self.persist_order_writes(OrderTable::Tasks, &source_plan.writes)
            .await?;

        let shifted: Vec<OrderWrite> = dest_plan
            .writes
            .into_iter()
            .filter(|w| w.id != task_id)
            .collect();
        self.persist_order_writes(OrderTable::Tasks, &shifted)
            .await?;

        Ok(())
    }

    // ----- comments -----

    pub async fn add_comment(
        &self,
        actor: &Actor,
        task_id: &str,
        content: &str,
        mentioned_user_ids: Vec<String>,
    ) -> Result<Comment> {
        let task = self.fetch_task(task_id).await?;
        let scope = self.project_scope_raw(&task.project_id).await?;
        if !permissions::can_post_comment(actor, &scope, &task.assignee_ids) {
            return Err(forbidden("comment on this task"));
        }
        if content.trim().is_empty() {
            return Err(AppError::Validation(
                "Comment content is required".to_string(),
            ));
        }
        self.require_org_users(&scope.organization_id, &mentioned_user_ids)
            .await?;

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            user_id: actor.user_id.clone(),
            content: content.to_string(),
            mentioned_user_ids,
            created_at: Utc::now().to_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO comments (id, task_id, user_id, content, mentioned_user_ids, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&comment.id)
        .bind(&comment.task_id)
        .bind(&comment.user_id)
        .bind(&comment.content)
        .bind(encode_id_list(&comment.mentioned_user_ids))
        .bind(&comment.created_at)
        .execute(self.pool())
        .await?;

        sqlx::query("UPDATE tasks SET comment_count = comment_count + 1 WHERE id = ?")
            .bind(task_id)
            .execute(self.pool())
            .await?;

        Ok(comment)
    }

    pub async fn list_comments(&self, actor: &Actor, task_id: &str) -> Result<Vec<Comment>> {
        let task = self.fetch_task(task_id).await?;
        let _ = self.project_scope_for(actor, &task.project_id).await?;

        let rows = sqlx::query_as::<_, (String, String, String, String, String, String)>(
            "SELECT id, task_id, user_id, content, mentioned_user_ids, created_at \
             FROM comments WHERE task_id = ? ORDER BY created_at ASC",
        )
        .bind(task_id)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter()
            .map(|(id, task_id, user_id, content, mentioned, created_at)| {
                Ok(Comment {
                    id,
                    task_id,
                    user_id,
                    content,
                    mentioned_user_ids: parse_id_list(&mentioned)?,
                    created_at,
                })
            })
            .collect()
    }

    pub async fn delete_comment(&self, actor: &Actor, comment_id: &str) -> Result<()> {
        let row = sqlx::query_as::<_, (String, String, String, String)>(
            "SELECT c.task_id, c.user_id, u.organization_role, p.organization_id \
             FROM comments c \
             JOIN users u ON c.user_id = u.id \
             JOIN tasks t ON c.task_id = t.id \
             JOIN projects p ON t.project_id = p.id \
             WHERE c.id = ?",
        )
        .bind(comment_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

        let (task_id, author_id, raw_role, organization_id) = row;
        let comment_scope = CommentScope {
            organization_id,
            author_id,
            author_role: parse_org_role(&raw_role)?,
        };
        if !permissions::can_delete_comment(actor, &comment_scope) {
            return Err(forbidden("delete this comment"));
        }

        sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(comment_id)
            .execute(self.pool())
            .await?;

        sqlx::query("UPDATE tasks SET comment_count = comment_count - 1 WHERE id = ?")
            .bind(&task_id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    // ----- drag reconciliation -----

    /// Run a completed drag gesture through the reconciler against the current
    /// snapshot, dispatch the committed mutation, and report how it resolved.
    pub async fn apply_drag(
        &self,
        actor: &Actor,
        gesture: &DragGesture,
    ) -> Result<(DragStatus, BoardSnapshot)> {
        let current = self.snapshot(actor).await?;

        match reconcile::reconcile(gesture, &current) {
            DragOutcome::Aborted => Ok((DragStatus::Aborted, current)),
            DragOutcome::Rejected => {
                tracing::debug!(entity = %gesture.entity_id, "stale drag gesture rejected");
                Ok((DragStatus::Rejected, current))
            }
            DragOutcome::Commit(mutation) => {
                match &mutation {
                    BoardMutation::ReorderProject {
                        project_id,
                        to_index,
                    } => {
                        self.move_project(actor, project_id, *to_index).await?;
                    }
                    BoardMutation::ReorderTask {
                        project_id,
                        task_id,
                        to_index,
                    } => {
                        self.move_task_within_project(actor, project_id, task_id, *to_index)
                            .await?;
                    }
                    BoardMutation::MoveTask {
                        from_project_id,
                        to_project_id,
                        task_id,
                        to_index,
                    } => {
                        self.move_task_between_projects(
                            actor,
                            from_project_id,
                            to_project_id,
                            task_id,
                            *to_index,
                        )
                        .await?;
                    }
                }
                let refreshed = self.snapshot(actor).await?;
                Ok((DragStatus::Applied, refreshed))
            }
        }
    }

    // ----- helpers -----

    async fn project_scope_raw(&self, project_id: &str) -> Result<ProjectScope> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT id, organization_id FROM projects WHERE id = ?",
        )
        .bind(project_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

        Ok(ProjectScope {
            id: row.0,
            organization_id: row.1,
        })
    }

    /// Scope lookup that also hides other tenants' projects behind NotFound.
    async fn project_scope_for(&self, actor: &Actor, project_id: &str) -> Result<ProjectScope> {
        let scope = self.project_scope_raw(project_id).await?;
        if scope.organization_id != actor.organization_id {
            return Err(AppError::NotFound("Project not found".to_string()));
        }
        Ok(scope)
    }

    async fn fetch_task(&self, task_id: &str) -> Result<Task> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"
        ))
        .bind(task_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))?;

        task_from_row(row)
    }

    async fn org_project_order(&self, organization_id: &str) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT id FROM projects WHERE organization_id = ? ORDER BY order_index",
        )
        .bind(organization_id)
        .fetch_all(self.pool())
        .await?;
        Ok(ids)
    }

    async fn project_task_order(&self, project_id: &str) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT id FROM tasks WHERE project_id = ? ORDER BY order_index",
        )
        .bind(project_id)
        .fetch_all(self.pool())
        .await?;
        Ok(ids)
    }

    /// Persist a re-index write set as N parallel update-by-id calls.
    async fn persist_order_writes(&self, table: OrderTable, writes: &[OrderWrite]) -> Result<()> {
        let statement = match table {
            OrderTable::Projects => "UPDATE projects SET order_index = ? WHERE id = ?",
            OrderTable::Tasks => "UPDATE tasks SET order_index = ? WHERE id = ?",
        };

        try_join_all(writes.iter().map(|write| {
            sqlx::query(statement)
                .bind(write.order_index)
                .bind(&write.id)
                .execute(self.pool())
        }))
        .await?;

        Ok(())
    }

    /// Every referenced user must exist inside the given organization.
    async fn require_org_users(&self, organization_id: &str, user_ids: &[String]) -> Result<()> {
        for user_id in user_ids {
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM users WHERE id = ? AND organization_id = ?",
            )
            .bind(user_id)
            .bind(organization_id)
            .fetch_one(self.pool())
            .await?;

            if exists == 0 {
                return Err(AppError::Validation(format!(
                    "User {user_id} is not part of this organization"
                )));
            }
        }
        Ok(())
    }
}
