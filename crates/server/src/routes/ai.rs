use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    middleware::auth::AuthUser,
    services::ai::{PriorityScore, Reaction, TaskSummary},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/prioritize", post(prioritize))
        .route("/react", post(react))
}

#[derive(Debug, Deserialize)]
pub struct PrioritizeRequest {
    pub project_id: String,
}

#[derive(Debug, Serialize)]
pub struct PrioritizeResponse {
    pub scores: Vec<PriorityScore>,
}

#[derive(Debug, Deserialize)]
pub struct ReactRequest {
    pub description: String,
}

/// Score a project's tasks through the AI assistant. Scores are advisory and
/// never written back; priority stays a user-controlled field.
async fn prioritize(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<PrioritizeRequest>,
) -> Result<Json<PrioritizeResponse>> {
    let actor = state.board.load_actor(&user.id).await?;
    let tasks = state.board.project_tasks(&actor, &body.project_id).await?;

    let summaries: Vec<TaskSummary> = tasks
        .into_iter()
        .map(|task| TaskSummary {
            id: task.id,
            title: task.title,
            deadline: task.eta,
            importance: task.priority.as_ref().to_string(),
            description: task.description,
        })
        .collect();

    let scores = state.ai.prioritize(&summaries).await?;
    Ok(Json(PrioritizeResponse { scores }))
}

async fn react(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<ReactRequest>,
) -> Result<Json<Reaction>> {
    let _ = state.board.load_actor(&user.id).await?;
    let reaction = state.ai.react_to(&body.description).await?;
    Ok(Json(reaction))
}
