use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::models::Task,
    error::Result,
    middleware::auth::AuthUser,
    services::board::{NewTask, TaskPatch},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/project/:project_id", get(list_tasks).post(create_task))
        .route("/:id", get(get_task).put(update_task).delete(delete_task))
        .route("/:id/move", post(move_task))
}

/// Move request: within the current project when `to_project_id` is absent,
/// cross-column otherwise.
#[derive(Debug, Deserialize)]
pub struct MoveTaskRequest {
    pub to_project_id: Option<String>,
    pub to_index: usize,
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
}

async fn list_tasks(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
) -> Result<Json<TaskListResponse>> {
    let actor = state.board.load_actor(&user.id).await?;
    let tasks = state.board.project_tasks(&actor, &project_id).await?;
    Ok(Json(TaskListResponse { tasks }))
}

async fn create_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
    Json(body): Json<NewTask>,
) -> Result<Json<Task>> {
    let actor = state.board.load_actor(&user.id).await?;
    let task = state.board.create_task(&actor, &project_id, body).await?;
    Ok(Json(task))
}

async fn get_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Task>> {
    let actor = state.board.load_actor(&user.id).await?;
    let task = state.board.get_task(&actor, &id).await?;
    Ok(Json(task))
}

async fn update_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<TaskPatch>,
) -> Result<Json<Task>> {
    let actor = state.board.load_actor(&user.id).await?;
    let task = state.board.update_task(&actor, &id, body).await?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<()>> {
    let actor = state.board.load_actor(&user.id).await?;
    state.board.delete_task(&actor, &id).await?;
    Ok(Json(()))
}

async fn move_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<MoveTaskRequest>,
) -> Result<Json<()>> {
    let actor = state.board.load_actor(&user.id).await?;
    let task = state.board.get_task(&actor, &id).await?;

    match body.to_project_id {
        Some(to_project_id) if to_project_id != task.project_id => {
            state
                .board
                .move_task_between_projects(
                    &actor,
                    &task.project_id,
                    &to_project_id,
                    &id,
                    body.to_index,
                )
                .await?;
        }
        _ => {
            state
                .board
                .move_task_within_project(&actor, &task.project_id, &id, body.to_index)
                .await?;
        }
    }

    Ok(Json(()))
}
