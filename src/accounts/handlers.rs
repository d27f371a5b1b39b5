use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{ExistsQuery, ExistsResponse, UserResponse};
use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
};

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/users/:id", get(get_user))
        .route("/user", get(get_me).delete(delete_me))
        .route("/exists", get(username_exists))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<UserResponse>> {
    let id = Uuid::parse_str(&id).map_err(|_| AppError::NotFound("user not found"))?;
    let account = state.accounts.find_by_id(id).await?;
    Ok(Json(account.into()))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<UserResponse>> {
    let account = state.accounts.find_by_id(user_id).await?;
    Ok(Json(account.into()))
}

/// Accounts can only delete themselves: the id comes from the token.
#[instrument(skip(state))]
pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<StatusCode> {
    state.accounts.delete(user_id).await?;
    info!(%user_id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn username_exists(
    State(state): State<AppState>,
    Query(query): Query<ExistsQuery>,
) -> AppResult<Json<ExistsResponse>> {
    let username = query
        .username
        .filter(|u| !u.is_empty())
        .ok_or(AppError::NotFound("no username query"))?;
    let count = state.accounts.count_by_username(&username).await?;
    Ok(Json(ExistsResponse {
        user_exists: count > 0,
    }))
}
