use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::models::{OrgRole, User},
    error::Result,
    middleware::auth::AuthUser,
    routes::auth::hash_password,
    services::access::UserUpdate,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", put(update_user).delete(delete_user))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    pub organization_role: OrgRole,
}

#[derive(Debug, Serialize)]
pub struct UsersListResponse {
    pub users: Vec<User>,
}

async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UsersListResponse>> {
    let actor = state.board.load_actor(&user.id).await?;
    let users = state.access.list_users(&actor).await?;
    Ok(Json(UsersListResponse { users }))
}

async fn create_user(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateUserRequest>,
) -> Result<Json<User>> {
    let actor = state.board.load_actor(&user.id).await?;

    if body.password.len() < 8 {
        return Err(crate::error::AppError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    let password_hash = hash_password(&body.password)?;

    let created = state
        .access
        .create_user(
            &actor,
            &body.email,
            &body.name,
            &password_hash,
            body.organization_role,
        )
        .await?;
    Ok(Json(created))
}

async fn update_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UserUpdate>,
) -> Result<Json<()>> {
    let actor = state.board.load_actor(&user.id).await?;
    state.access.update_user(&actor, &id, body).await?;
    Ok(Json(()))
}

async fn delete_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<()>> {
    let actor = state.board.load_actor(&user.id).await?;
    state.access.delete_user(&actor, &id).await?;
    Ok(Json(()))
}
