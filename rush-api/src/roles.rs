use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};
use rush_core::Role;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::UserClaims,
    state::AppState,
    trips::TripResponse,
    validation::AppJson,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RoleRequest {
    role: Role,
}

/// What the user sees in their current role: open trips for passengers,
/// their own offers for drivers.
#[derive(Debug, Serialize)]
struct RoleView {
    role: Role,
    trips: Vec<TripResponse>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/roles/{id}", get(role_view).put(switch_role))
}

async fn role_view(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoleView>, AppError> {
    let user = state
        .users
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("User not found: {}", id)))?;

    let trips = match user.role {
        Role::Passenger => state.trips.list_available_trips().await?,
        Role::Driver => state.trips.list_trips_by_ids(&user.my_trips).await?,
    };

    Ok(Json(RoleView {
        role: user.role,
        trips: trips.into_iter().map(TripResponse::from).collect(),
    }))
}

async fn switch_role(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<RoleRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    claims.ensure_self(id)?;

    state.users.set_role(id, req.role).await?;
    info!("User {} switched to role {}", id, req.role);

    Ok(Json(serde_json::json!({ "role": req.role })))
}
