use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use rush_core::Car;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::UserClaims,
    state::AppState,
    validation::{self, AppJson, Validate},
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CarRequest {
    plate: String,
    passengers: u32,
    brand: String,
    /// Model year.
    model: String,
    #[serde(default)]
    photo_car_url: Option<String>,
    #[serde(default)]
    photo_soat_url: Option<String>,
}

impl Validate for CarRequest {
    fn validate(&self) -> Result<(), AppError> {
        validation::plate(&self.plate)?;
        if self.passengers == 0 {
            return Err(AppError::ValidationError(
                "A car must carry at least one passenger".to_string(),
            ));
        }
        validation::letters("brand", &self.brand)?;
        validation::digits("model", &self.model)
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/car/{id}",
        post(create_car).get(get_car).put(update_car).delete(delete_car),
    )
}

/// `id` is the owner's user id.
async fn create_car(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<CarRequest>,
) -> Result<(StatusCode, Json<Car>), AppError> {
    claims.ensure_self(id)?;
    req.validate()?;

    let mut car = Car::new(id, req.plate, req.passengers, req.brand, req.model);
    car.photo_car_url = req.photo_car_url;
    car.photo_soat_url = req.photo_soat_url;

    state.cars.create_car(&car).await?;
    info!("Car {} registered for user {}", car.id, id);

    Ok((StatusCode::CREATED, Json(car)))
}

async fn get_car(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Car>, AppError> {
    Ok(Json(find_car(&state, id).await?))
}

async fn update_car(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<CarRequest>,
) -> Result<Json<Car>, AppError> {
    let mut car = find_car(&state, id).await?;
    claims.ensure_self(car.owner_id)?;
    req.validate()?;

    // Trips already offered on this car must still fit in it.
    let trips = state.trips.list_trips_by_car(id).await?;
    if let Some(largest) = trips.iter().map(|t| t.capacity_total).max() {
        if req.passengers < largest {
            return Err(AppError::ConflictError(format!(
                "Car {} has a trip offering {} places, cannot reduce passengers to {}",
                id, largest, req.passengers
            )));
        }
    }

    car.plate = req.plate;
    car.passengers = req.passengers;
    car.brand = req.brand;
    car.model = req.model;
    if req.photo_car_url.is_some() {
        car.photo_car_url = req.photo_car_url;
    }
    if req.photo_soat_url.is_some() {
        car.photo_soat_url = req.photo_soat_url;
    }

    state.cars.update_car(&car).await?;
    Ok(Json(car))
}

async fn delete_car(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let car = find_car(&state, id).await?;
    claims.ensure_self(car.owner_id)?;

    state.cars.delete_car(id).await?;
    info!("Car {} removed by user {}", id, claims.sub);

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn find_car(state: &AppState, id: Uuid) -> Result<Car, AppError> {
    state
        .cars
        .get_car(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Car not found: {}", id)))
}
