use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RegisterRequest},
        extractors::AuthUser,
        repo_types::CurrentUser,
        services,
    },
    error::AppResult,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/profile", get(profile))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let Json(req) = payload?;
    let res = services::register(&state, req).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<AuthResponse>> {
    let Json(req) = payload?;
    Ok(Json(services::login(&state, req).await?))
}

#[instrument(skip(user), fields(user_id = %user.id))]
pub async fn profile(AuthUser(user): AuthUser) -> Json<CurrentUser> {
    Json(user)
}
