use axum::{extract::State, routing::post, Json, Router};
use tracing::instrument;

use crate::{
    accounts::dto::UserResponse,
    auth::{dto::LoginResponse, extractors::BasicAuth, services},
    error::AppResult,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    BasicAuth(credential): BasicAuth,
) -> AppResult<Json<UserResponse>> {
    let account = services::register(&state, credential).await?;
    Ok(Json(account.into()))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    BasicAuth(credential): BasicAuth,
) -> AppResult<Json<LoginResponse>> {
    let token = services::login(&state, credential).await?;
    Ok(Json(LoginResponse { token }))
}
