use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};
use rush_core::User;
use rush_shared::Masked;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{hash_password, ProfileRequest},
    error::AppError,
    middleware::auth::UserClaims,
    state::AppState,
    validation::{AppJson, Validate},
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/register/{id}", get(get_user).put(update_user))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    let user = state
        .users
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("User not found: {}", id)))?;
    Ok(Json(user))
}

async fn update_user(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<ProfileRequest>,
) -> Result<Json<User>, AppError> {
    claims.ensure_self(id)?;
    req.validate()?;

    let mut user = state
        .users
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("User not found: {}", id)))?;

    user.id_user = req.id_user;
    user.name = req.name;
    user.last_name = req.last_name;
    user.email = req.email;
    user.number = req.number;
    user.password_hash = hash_password(req.password).await?;
    if req.photo_url.is_some() {
        user.photo_url = req.photo_url;
    }

    state.users.update_profile(&user).await?;
    info!("Updated profile of user {} ({})", user.id, Masked::new(&user.email));

    Ok(Json(user))
}
