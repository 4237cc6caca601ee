use std::sync::Arc;
use std::time::Duration;

use rush_core::events::EventPublisher;
use rush_core::{
    CarDirectory, StoreError, Trip, TripCommit, TripDetails, TripStore, TripWrite,
    UserListUpdate,
};
use rush_shared::models::events::LedgerEvent;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::transitions::{self, Resize, Transition};

/// Retry policy for optimistic commits.
#[derive(Debug, Clone, Copy)]
pub struct LedgerSettings {
    /// Total read-check-write attempts per operation, first try included.
    pub max_attempts: u32,
    /// Pause before retry `n` is `retry_backoff * n`.
    pub retry_backoff: Duration,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_backoff: Duration::from_millis(10),
        }
    }
}

/// Input for offering a new trip.
#[derive(Debug, Clone)]
pub struct NewTrip {
    pub car_id: Uuid,
    pub driver_id: Uuid,
    pub details: TripDetails,
    pub capacity_total: u32,
    pub stops: Vec<String>,
}

/// Driver edits to an existing trip.
#[derive(Debug, Clone)]
pub struct TripUpdate {
    pub details: TripDetails,
    pub capacity_total: Option<u32>,
}

/// Owns trip capacity and reservation state. Every mutation runs as a pure
/// transition inside a version-checked commit and is re-run from a fresh read
/// when another writer got there first.
#[derive(Clone)]
pub struct BookingLedger {
    trips: Arc<dyn TripStore>,
    cars: Arc<dyn CarDirectory>,
    events: Arc<dyn EventPublisher>,
    settings: LedgerSettings,
}

impl BookingLedger {
    pub fn new(
        trips: Arc<dyn TripStore>,
        cars: Arc<dyn CarDirectory>,
        events: Arc<dyn EventPublisher>,
        settings: LedgerSettings,
    ) -> Self {
        Self {
            trips,
            cars,
            events,
            settings,
        }
    }

    pub fn settings(&self) -> LedgerSettings {
        self.settings
    }

    pub async fn trip(&self, trip_id: Uuid) -> Result<Trip, LedgerError> {
        self.trips
            .read_trip(trip_id)
            .await?
            .map(|versioned| versioned.data)
            .ok_or(LedgerError::TripNotFound(trip_id))
    }

    /// Offers a new trip. The driver must own the car and the capacity must
    /// fit in it. The trip id lands in the driver's trip list in the same commit.
    pub async fn create_trip(&self, new_trip: NewTrip) -> Result<Trip, LedgerError> {
        if new_trip.capacity_total == 0 {
            return Err(LedgerError::Validation(
                "A trip must offer at least one place".to_string(),
            ));
        }
        let stops = normalize_stops(&new_trip.stops)?;

        let owner = self
            .cars
            .get_owner(new_trip.car_id)
            .await?
            .ok_or(LedgerError::CarNotFound(new_trip.car_id))?;
        if owner != new_trip.driver_id {
            return Err(LedgerError::NotCarOwner {
                car_id: new_trip.car_id,
                user_id: new_trip.driver_id,
            });
        }

        let car_capacity = self.car_capacity(new_trip.car_id).await?;
        if new_trip.capacity_total > car_capacity {
            return Err(LedgerError::Validation(format!(
                "Trip capacity {} exceeds car capacity {}",
                new_trip.capacity_total, car_capacity
            )));
        }

        let trip = Trip::new(
            new_trip.car_id,
            new_trip.driver_id,
            new_trip.details,
            new_trip.capacity_total,
            stops,
        );

        self.trips
            .commit(TripCommit {
                trip_id: trip.id,
                expected_version: None,
                write: TripWrite::Insert(trip.clone()),
                user_updates: vec![UserListUpdate::AddOwnedTrip {
                    user_id: trip.driver_id,
                    trip_id: trip.id,
                }],
            })
            .await?;

        info!(
            "Trip {} created on car {} with {} places",
            trip.id, trip.car_id, trip.capacity_total
        );
        Ok(trip)
    }

    pub async fn update_trip(&self, trip_id: Uuid, update: TripUpdate) -> Result<Trip, LedgerError> {
        // Descriptive edits stay possible after the car is gone.
        let resize = match update.capacity_total {
            Some(capacity_total) => {
                let current = self.trip(trip_id).await?;
                Some(Resize {
                    capacity_total,
                    car_capacity: self.car_capacity(current.car_id).await?,
                })
            }
            None => None,
        };

        self.transact(trip_id, "update_trip", |trip| {
            transitions::update_trip(trip, update.details.clone(), resize)
        })
        .await
    }

    /// Books `seats` on the trip for `user_id` and returns the reservation id.
    pub async fn reserve(
        &self,
        trip_id: Uuid,
        user_id: Uuid,
        seats: u32,
        stops: &[String],
    ) -> Result<Uuid, LedgerError> {
        if seats == 0 {
            return Err(LedgerError::Validation(
                "At least one place must be reserved".to_string(),
            ));
        }
        let stops = normalize_stops(stops)?;
        if stops.is_empty() {
            return Err(LedgerError::Validation(
                "At least one stop must be provided".to_string(),
            ));
        }

        self.transact(trip_id, "reserve", |trip| {
            transitions::reserve(trip, user_id, seats, &stops)
        })
        .await
    }

    /// Returns the number of seats released.
    pub async fn cancel_reservation(&self, trip_id: Uuid, user_id: Uuid) -> Result<u32, LedgerError> {
        self.transact(trip_id, "cancel_reservation", |trip| {
            transitions::cancel_reservation(trip, user_id)
        })
        .await
    }

    /// Returns the users whose reservation was voided by losing its last stop.
    pub async fn cancel_stop(&self, trip_id: Uuid, stop: &str) -> Result<Vec<Uuid>, LedgerError> {
        let stop = stop.trim();
        self.transact(trip_id, "cancel_stop", |trip| transitions::cancel_stop(trip, stop))
            .await
    }

    /// Returns the passengers who lost their reservation.
    pub async fn cancel_trip(&self, trip_id: Uuid) -> Result<Vec<Uuid>, LedgerError> {
        self.transact(trip_id, "cancel_trip", |trip| Ok(transitions::cancel_trip(trip)))
            .await
    }

    async fn car_capacity(&self, car_id: Uuid) -> Result<u32, LedgerError> {
        self.cars
            .get_capacity(car_id)
            .await?
            .ok_or(LedgerError::CarNotFound(car_id))
    }

    /// Read, apply `rule`, commit against the version read. On a version
    /// conflict the whole cycle starts over until `max_attempts` is spent.
    async fn transact<T, F>(&self, trip_id: Uuid, op: &'static str, mut rule: F) -> Result<T, LedgerError>
    where
        F: FnMut(&Trip) -> Result<Transition<T>, LedgerError>,
    {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let current = self
                .trips
                .read_trip(trip_id)
                .await?
                .ok_or(LedgerError::TripNotFound(trip_id))?;

            let Transition {
                write,
                user_updates,
                event,
                outcome,
            } = rule(&current.data)?;

            let commit = TripCommit {
                trip_id,
                expected_version: Some(current.version),
                write,
                user_updates,
            };

            match self.trips.commit(commit).await {
                Ok(()) => {
                    debug!("{} on trip {} committed at attempt {}", op, trip_id, attempt);
                    if let Some(event) = event {
                        self.publish(event).await;
                    }
                    return Ok(outcome);
                }
                Err(StoreError::Conflict { expected, actual, .. }) if attempt < max_attempts => {
                    warn!(
                        "{} on trip {} hit a version conflict (read {:?}, found {:?}), retrying ({}/{})",
                        op, trip_id, expected, actual, attempt, max_attempts
                    );
                    tokio::time::sleep(self.settings.retry_backoff * attempt).await;
                }
                Err(StoreError::Conflict { .. }) => {
                    error!("{} on trip {} gave up after {} attempts", op, trip_id, attempt);
                    return Err(LedgerError::TransientConflict {
                        trip_id,
                        attempts: attempt,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn publish(&self, event: LedgerEvent) {
        if let Err(e) = self.events.publish(&event).await {
            warn!("Failed to publish {} for trip {}: {}", event.topic(), event.trip_id(), e);
        }
    }
}

/// Trims stop names, rejects blank ones and drops duplicates keeping the
/// first occurrence.
fn normalize_stops(stops: &[String]) -> Result<Vec<String>, LedgerError> {
    let mut normalized: Vec<String> = Vec::with_capacity(stops.len());
    for stop in stops {
        let stop = stop.trim();
        if stop.is_empty() {
            return Err(LedgerError::Validation("Stop names cannot be blank".to_string()));
        }
        if !normalized.iter().any(|s| s == stop) {
            normalized.push(stop.to_string());
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_stops_trims_and_dedups() {
        let stops = vec![" Portal ".to_string(), "Museo".to_string(), "Portal".to_string()];
        assert_eq!(
            normalize_stops(&stops).unwrap(),
            vec!["Portal".to_string(), "Museo".to_string()]
        );
    }

    #[test]
    fn test_normalize_stops_rejects_blank() {
        let stops = vec!["Portal".to_string(), "   ".to_string()];
        assert!(matches!(normalize_stops(&stops), Err(LedgerError::Validation(_))));
    }
}
