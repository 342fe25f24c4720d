use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{db::models::Comment, error::Result, middleware::auth::AuthUser, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/task/:task_id", get(list_comments))
        .route("/", post(create_comment))
        .route("/:id", axum::routing::delete(delete_comment))
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub task_id: String,
    pub content: String,
    #[serde(default)]
    pub mentioned_user_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CommentsListResponse {
    pub comments: Vec<Comment>,
}

async fn list_comments(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<String>,
) -> Result<Json<CommentsListResponse>> {
    let actor = state.board.load_actor(&user.id).await?;
    let comments = state.board.list_comments(&actor, &task_id).await?;
    Ok(Json(CommentsListResponse { comments }))
}

async fn create_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateCommentRequest>,
) -> Result<Json<Comment>> {
    let actor = state.board.load_actor(&user.id).await?;
    let comment = state
        .board
        .add_comment(&actor, &body.task_id, &body.content, body.mentioned_user_ids)
        .await?;
    Ok(Json(comment))
}

async fn delete_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<()>> {
    let actor = state.board.load_actor(&user.id).await?;
    state.board.delete_comment(&actor, &id).await?;
    Ok(Json(()))
}
