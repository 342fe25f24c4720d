use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::{
    board::{reconcile::DragGesture, snapshot::BoardSnapshot},
    error::Result,
    middleware::auth::AuthUser,
    services::board::DragStatus,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_snapshot))
        .route("/drag-end", post(drag_end))
}

#[derive(Debug, Serialize)]
pub struct DragEndResponse {
    pub status: DragStatus,
    pub snapshot: BoardSnapshot,
}

async fn get_snapshot(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<BoardSnapshot>> {
    let actor = state.board.load_actor(&user.id).await?;
    let snapshot = state.board.snapshot(&actor).await?;
    Ok(Json(snapshot))
}

/// Reconcile a completed drag gesture against the current snapshot and apply
/// the resulting mutation. The response always carries a fresh snapshot; a
/// `rejected` status tells the client its gesture raced a concurrent change
/// and the board it was looking at is gone.
async fn drag_end(
    State(state): State<AppState>,
    user: AuthUser,
    Json(gesture): Json<DragGesture>,
) -> Result<Json<DragEndResponse>> {
    let actor = state.board.load_actor(&user.id).await?;
    let (status, snapshot) = state.board.apply_drag(&actor, &gesture).await?;
    Ok(Json(DragEndResponse { status, snapshot }))
}
