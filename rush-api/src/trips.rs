use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get, put},
    Extension, Json, Router,
};
use futures_util::stream::{Stream, StreamExt};
use rush_booking::{NewTrip, TripUpdate};
use rush_core::{Trip, TripDetails, TripStatus};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    cars::find_car,
    error::AppError,
    middleware::auth::UserClaims,
    state::AppState,
    validation::{self, AppJson, Validate},
};

/// A trip as clients see it, with its derived status.
#[derive(Debug, Serialize)]
pub struct TripResponse {
    #[serde(flatten)]
    pub trip: Trip,
    pub status: TripStatus,
}

impl From<Trip> for TripResponse {
    fn from(trip: Trip) -> Self {
        let status = trip.status();
        Self { trip, status }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateTripRequest {
    start_trip: String,
    end_trip: String,
    route: String,
    time_trip: String,
    date: String,
    price_trip: u32,
    available_places: u32,
    #[serde(default)]
    stops: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateTripRequest {
    start_trip: String,
    end_trip: String,
    route: String,
    time_trip: String,
    date: String,
    price_trip: u32,
    /// New total capacity; must stay at or above the seats already booked.
    #[serde(default)]
    capacity_total: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReserveRequest {
    reserved_places: u32,
    stops: Vec<String>,
}

fn validate_details(details: &TripDetails) -> Result<(), AppError> {
    validation::required("start_trip", &details.start_trip)?;
    validation::required("end_trip", &details.end_trip)?;
    validation::required("route", &details.route)?;
    validation::time_of_day(&details.time_trip)?;
    validation::date(&details.date)
}

impl CreateTripRequest {
    fn details(&self) -> TripDetails {
        TripDetails {
            start_trip: self.start_trip.trim().to_string(),
            end_trip: self.end_trip.trim().to_string(),
            route: self.route.trim().to_string(),
            time_trip: self.time_trip.clone(),
            date: self.date.clone(),
            price_trip: self.price_trip,
        }
    }
}

impl Validate for CreateTripRequest {
    fn validate(&self) -> Result<(), AppError> {
        validate_details(&self.details())?;
        if self.available_places == 0 {
            return Err(AppError::ValidationError(
                "available_places must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl UpdateTripRequest {
    fn details(&self) -> TripDetails {
        TripDetails {
            start_trip: self.start_trip.trim().to_string(),
            end_trip: self.end_trip.trim().to_string(),
            route: self.route.trim().to_string(),
            time_trip: self.time_trip.clone(),
            date: self.date.clone(),
            price_trip: self.price_trip,
        }
    }
}

impl Validate for UpdateTripRequest {
    fn validate(&self) -> Result<(), AppError> {
        validate_details(&self.details())?;
        if self.capacity_total == Some(0) {
            return Err(AppError::ValidationError(
                "capacity_total must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Validate for ReserveRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.reserved_places == 0 {
            return Err(AppError::ValidationError(
                "reserved_places must be at least 1".to_string(),
            ));
        }
        if self.stops.is_empty() {
            return Err(AppError::ValidationError("stops must not be empty".to_string()));
        }
        Ok(())
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/trips", get(list_available_trips))
        .route(
            "/trips/{id}",
            get(get_trip).post(create_trip).put(update_trip).delete(cancel_trip),
        )
        .route("/trips/car/{id}", get(trips_by_car))
        .route("/trips/user/{id}", get(trips_by_user))
        .route("/trips/reserve/{id}", put(reserve).delete(cancel_reservation))
        .route("/trips/{id}/stops/{stop}", delete(cancel_stop))
        .route("/trips/{id}/stream", get(stream_trip))
}

fn to_responses(trips: Vec<Trip>) -> Json<Vec<TripResponse>> {
    Json(trips.into_iter().map(TripResponse::from).collect())
}

/// Loads the trip and checks the caller is its driver.
async fn driven_trip(state: &AppState, claims: &UserClaims, id: Uuid) -> Result<Trip, AppError> {
    let trip = state.ledger.trip(id).await?;
    claims.ensure_self(trip.driver_id)?;
    Ok(trip)
}

async fn list_available_trips(
    State(state): State<AppState>,
) -> Result<Json<Vec<TripResponse>>, AppError> {
    Ok(to_responses(state.trips.list_available_trips().await?))
}

async fn get_trip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TripResponse>, AppError> {
    Ok(Json(state.ledger.trip(id).await?.into()))
}

/// `id` is the car offering the trip.
async fn create_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<CreateTripRequest>,
) -> Result<(StatusCode, Json<TripResponse>), AppError> {
    req.validate()?;

    let trip = state
        .ledger
        .create_trip(NewTrip {
            car_id: id,
            driver_id: claims.sub,
            details: req.details(),
            capacity_total: req.available_places,
            stops: req.stops,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(trip.into())))
}

async fn trips_by_car(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TripResponse>>, AppError> {
    let car = find_car(&state, id).await?;
    claims.ensure_self(car.owner_id)?;
    Ok(to_responses(state.trips.list_trips_by_car(id).await?))
}

/// Trips the user holds a reservation on.
async fn trips_by_user(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TripResponse>>, AppError> {
    claims.ensure_self(id)?;
    let user = state
        .users
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("User not found: {}", id)))?;
    Ok(to_responses(state.trips.list_trips_by_ids(&user.reserved_trips).await?))
}

async fn update_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<UpdateTripRequest>,
) -> Result<Json<TripResponse>, AppError> {
    driven_trip(&state, &claims, id).await?;
    req.validate()?;

    let trip = state
        .ledger
        .update_trip(
            id,
            TripUpdate {
                details: req.details(),
                capacity_total: req.capacity_total,
            },
        )
        .await?;

    Ok(Json(trip.into()))
}

async fn reserve(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<ReserveRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    req.validate()?;

    let reservation_id = state
        .ledger
        .reserve(id, claims.sub, req.reserved_places, &req.stops)
        .await?;
    info!("User {} reserved {} places on trip {}", claims.sub, req.reserved_places, id);

    Ok(Json(json!({ "trip_id": id, "reservation_id": reservation_id })))
}

async fn cancel_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let seats_released = state.ledger.cancel_reservation(id, claims.sub).await?;
    info!("User {} released {} places on trip {}", claims.sub, seats_released, id);

    Ok(Json(json!({ "trip_id": id, "seats_released": seats_released })))
}

async fn cancel_stop(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path((id, stop)): Path<(Uuid, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    driven_trip(&state, &claims, id).await?;

    let voided_users = state.ledger.cancel_stop(id, &stop).await?;
    Ok(Json(json!({ "trip_id": id, "stop": stop, "voided_users": voided_users })))
}

async fn cancel_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    driven_trip(&state, &claims, id).await?;

    let affected_users = state.ledger.cancel_trip(id).await?;
    info!("Trip {} cancelled, {} passengers affected", id, affected_users.len());

    Ok(Json(json!({ "trip_id": id, "affected_users": affected_users })))
}

/// Live ledger events for one trip as server-sent events named by topic.
async fn stream_trip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.sse_tx.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |msg| async move {
        match msg {
            Ok(event) if event.trip_id() == id => Event::default()
                .event(event.topic())
                .json_data(&event)
                .ok()
                .map(Ok),
            Ok(_) => None,
            Err(e) => {
                debug!("SSE subscriber for trip {} lagged: {}", id, e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request() -> CreateTripRequest {
        CreateTripRequest {
            start_trip: "Universidad".into(),
            end_trip: "Portal Norte".into(),
            route: "Autopista Norte".into(),
            time_trip: "07:30".into(),
            date: "03-11-2026".into(),
            price_trip: 6000,
            available_places: 3,
            stops: vec!["Calle 100".into()],
        }
    }

    #[test]
    fn test_create_trip_validation() {
        assert!(create_request().validate().is_ok());

        let mut bad = create_request();
        bad.time_trip = "7:30am".into();
        assert!(bad.validate().is_err());

        let mut bad = create_request();
        bad.available_places = 0;
        assert!(bad.validate().is_err());

        let mut bad = create_request();
        bad.route = " ".into();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_reserve_request_rejects_unknown_fields() {
        let raw = r#"{"reserved_places":1,"stops":["Centro"],"user_id":"x"}"#;
        assert!(serde_json::from_str::<ReserveRequest>(raw).is_err());

        let raw = r#"{"reserved_places":1,"stops":["Centro"]}"#;
        let req: ReserveRequest = serde_json::from_str(raw).unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_response_carries_status() {
        let trip = Trip::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            create_request().details(),
            2,
            vec![],
        );
        let value = serde_json::to_value(TripResponse::from(trip)).unwrap();
        assert_eq!(value["status"], "available");
        assert_eq!(value["available_places"], 2);
    }
}
