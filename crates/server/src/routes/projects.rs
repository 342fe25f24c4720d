use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::models::{Project, ProjectRole},
    error::Result,
    middleware::auth::AuthUser,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route("/:id", put(update_project).delete(delete_project))
        .route("/:id/move", post(move_project))
        .route("/:id/members", get(list_members).post(set_member))
        .route(
            "/:id/members/:user_id",
            axum::routing::delete(remove_member),
        )
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveProjectRequest {
    pub to_index: usize,
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<Project>,
}

#[derive(Debug, Deserialize)]
pub struct SetMemberRequest {
    pub user_id: String,
    pub role: ProjectRole,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub role: ProjectRole,
}

#[derive(Debug, Serialize)]
pub struct MembersListResponse {
    pub members: Vec<MemberResponse>,
}

#[derive(Debug, Deserialize)]
pub struct MemberPathParams {
    pub id: String,
    pub user_id: String,
}

async fn list_projects(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ProjectListResponse>> {
    let actor = state.board.load_actor(&user.id).await?;
    let projects = state.board.org_projects(&actor.organization_id).await?;
    Ok(Json(ProjectListResponse { projects }))
}

async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateProjectRequest>,
) -> Result<Json<Project>> {
    let actor = state.board.load_actor(&user.id).await?;
    let project = state.board.create_project(&actor, &body.title).await?;
    Ok(Json(project))
}

async fn update_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateProjectRequest>,
) -> Result<Json<()>> {
    let actor = state.board.load_actor(&user.id).await?;
    state.board.update_project(&actor, &id, &body.title).await?;
    Ok(Json(()))
}

async fn delete_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<()>> {
    let actor = state.board.load_actor(&user.id).await?;
    state.board.delete_project(&actor, &id).await?;
    Ok(Json(()))
}

async fn move_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<MoveProjectRequest>,
) -> Result<Json<()>> {
    let actor = state.board.load_actor(&user.id).await?;
    state.board.move_project(&actor, &id, body.to_index).await?;
    Ok(Json(()))
}

async fn list_members(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
) -> Result<Json<MembersListResponse>> {
    let actor = state.board.load_actor(&user.id).await?;
    let members = state.access.list_memberships(&actor, &project_id).await?;

    let members = members
        .into_iter()
        .map(|(member, role)| MemberResponse {
            user_id: member.id,
            user_name: member.name,
            user_email: member.email,
            role,
        })
        .collect();

    Ok(Json(MembersListResponse { members }))
}

async fn set_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
    Json(body): Json<SetMemberRequest>,
) -> Result<Json<()>> {
    let actor = state.board.load_actor(&user.id).await?;
    state
        .access
        .set_membership(&actor, &project_id, &body.user_id, body.role)
        .await?;
    Ok(Json(()))
}

async fn remove_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path(params): Path<MemberPathParams>,
) -> Result<Json<()>> {
    let actor = state.board.load_actor(&user.id).await?;
    state
        .access
        .remove_membership(&actor, &params.id, &params.user_id)
        .await?;
    Ok(Json(()))
}
