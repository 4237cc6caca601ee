//! Pure booking rules. Each function takes the trip as last read from the
//! store and returns the write to commit, or a rejection. Nothing here touches
//! I/O, so the ledger can re-run a transition as often as conflicts demand.

use chrono::Utc;
use rush_core::{Reservation, Trip, TripDetails, TripWrite, UserListUpdate};
use rush_shared::models::events::{
    LedgerEvent, ReservationCancelledEvent, StopCancelledEvent, TripCancelledEvent,
    TripReservedEvent,
};
use uuid::Uuid;

use crate::error::LedgerError;

/// The result of applying a rule to a trip.
#[derive(Debug)]
pub struct Transition<T> {
    pub write: TripWrite,
    pub user_updates: Vec<UserListUpdate>,
    pub event: Option<LedgerEvent>,
    pub outcome: T,
}

/// Books `seats` for `user_id`. A second booking by the same user is merged
/// into the first one and keeps its reservation id.
pub fn reserve(
    trip: &Trip,
    user_id: Uuid,
    seats: u32,
    stops: &[String],
) -> Result<Transition<Uuid>, LedgerError> {
    if seats > trip.available_places {
        return Err(LedgerError::CapacityExceeded {
            requested: seats,
            available: trip.available_places,
        });
    }

    let mut next = trip.clone();
    let mut user_updates = Vec::new();

    let reservation_id = match next.reservation_for_mut(&user_id) {
        Some(existing) => {
            existing.seats_reserved += seats;
            for stop in stops {
                if !existing.references_stop(stop) {
                    existing.stops.push(stop.clone());
                }
            }
            existing.id
        }
        None => {
            let reservation = Reservation::new(user_id, seats, stops.to_vec());
            let id = reservation.id;
            next.reservations.push(reservation);
            user_updates.push(UserListUpdate::AddReservedTrip {
                user_id,
                trip_id: trip.id,
            });
            id
        }
    };

    next.available_places -= seats;
    for stop in stops {
        next.merge_stop(stop);
    }
    next.touch();
    debug_assert!(next.is_balanced());

    let event = LedgerEvent::TripReserved(TripReservedEvent {
        trip_id: trip.id,
        reservation_id,
        user_id,
        seats_reserved: seats,
        available_places: next.available_places,
        timestamp: Utc::now().timestamp(),
    });

    Ok(Transition {
        write: TripWrite::Update(next),
        user_updates,
        event: Some(event),
        outcome: reservation_id,
    })
}

/// Drops the user's reservation and returns its seats. Stops the reservation
/// introduced leave the trip unless another reservation or the driver's plan
/// still needs them. The outcome is the number of seats released.
pub fn cancel_reservation(trip: &Trip, user_id: Uuid) -> Result<Transition<u32>, LedgerError> {
    let index = trip
        .reservations
        .iter()
        .position(|r| r.user_id == user_id)
        .ok_or(LedgerError::ReservationNotFound {
            trip_id: trip.id,
            user_id,
        })?;

    let mut next = trip.clone();
    let removed = next.reservations.remove(index);
    next.available_places += removed.seats_reserved;

    for stop in &removed.stops {
        if !next.is_planned_stop(stop) && !next.stop_claimed_by_others(stop, &user_id) {
            next.stops.retain(|s| s != stop);
        }
    }
    next.touch();
    debug_assert!(next.is_balanced());

    let event = LedgerEvent::ReservationCancelled(ReservationCancelledEvent {
        trip_id: trip.id,
        user_id,
        seats_released: removed.seats_reserved,
        available_places: next.available_places,
        timestamp: Utc::now().timestamp(),
    });

    Ok(Transition {
        write: TripWrite::Update(next),
        user_updates: vec![UserListUpdate::RemoveReservedTrip {
            user_id,
            trip_id: trip.id,
        }],
        event: Some(event),
        outcome: removed.seats_reserved,
    })
}

/// Removes `stop` from the trip and from every reservation that chose it.
///
/// Seat credit is all-or-nothing per reservation: one that still has other
/// stops keeps its seats, one left without stops is voided and its seats go
/// back to the trip. The outcome lists the users whose reservation was voided.
pub fn cancel_stop(trip: &Trip, stop: &str) -> Result<Transition<Vec<Uuid>>, LedgerError> {
    if !trip.has_stop(stop) {
        return Err(LedgerError::StopNotFound {
            trip_id: trip.id,
            stop: stop.to_string(),
        });
    }

    let mut next = trip.clone();
    let mut voided = Vec::new();
    let mut freed = 0u32;

    next.reservations.retain_mut(|reservation| {
        if !reservation.references_stop(stop) {
            return true;
        }
        reservation.stops.retain(|s| s != stop);
        if reservation.stops.is_empty() {
            freed += reservation.seats_reserved;
            voided.push(reservation.user_id);
            false
        } else {
            true
        }
    });

    next.available_places += freed;
    next.stops.retain(|s| s != stop);
    next.planned_stops.retain(|s| s != stop);
    next.touch();
    debug_assert!(next.is_balanced());

    let user_updates = voided
        .iter()
        .map(|user_id| UserListUpdate::RemoveReservedTrip {
            user_id: *user_id,
            trip_id: trip.id,
        })
        .collect();

    let event = LedgerEvent::StopCancelled(StopCancelledEvent {
        trip_id: trip.id,
        stop: stop.to_string(),
        voided_users: voided.clone(),
        available_places: next.available_places,
        timestamp: Utc::now().timestamp(),
    });

    Ok(Transition {
        write: TripWrite::Update(next),
        user_updates,
        event: Some(event),
        outcome: voided,
    })
}

/// Deletes the trip and detaches it from every passenger and from the driver.
/// The outcome lists the passengers whose reservation was voided.
pub fn cancel_trip(trip: &Trip) -> Transition<Vec<Uuid>> {
    let passengers = trip.passenger_ids();

    let mut user_updates: Vec<UserListUpdate> = passengers
        .iter()
        .map(|user_id| UserListUpdate::RemoveReservedTrip {
            user_id: *user_id,
            trip_id: trip.id,
        })
        .collect();
    user_updates.push(UserListUpdate::RemoveOwnedTrip {
        user_id: trip.driver_id,
        trip_id: trip.id,
    });

    let event = LedgerEvent::TripCancelled(TripCancelledEvent {
        trip_id: trip.id,
        driver_id: trip.driver_id,
        affected_users: passengers.clone(),
        timestamp: Utc::now().timestamp(),
    });

    Transition {
        write: TripWrite::Delete,
        user_updates,
        event: Some(event),
        outcome: passengers,
    }
}

/// A capacity change together with the car capacity it must fit in.
#[derive(Debug, Clone, Copy)]
pub struct Resize {
    pub capacity_total: u32,
    pub car_capacity: u32,
}

/// Replaces the descriptive fields and optionally resizes the trip. The new
/// capacity must cover the seats already booked and fit in the car.
pub fn update_trip(
    trip: &Trip,
    details: TripDetails,
    resize: Option<Resize>,
) -> Result<Transition<Trip>, LedgerError> {
    let mut next = trip.clone();
    next.details = details;

    if let Some(Resize {
        capacity_total: capacity,
        car_capacity,
    }) = resize
    {
        let reserved = trip.seats_reserved();
        if capacity < reserved {
            return Err(LedgerError::CapacityBelowReserved {
                requested: capacity,
                reserved,
            });
        }
        if capacity > car_capacity {
            return Err(LedgerError::Validation(format!(
                "Trip capacity {} exceeds car capacity {}",
                capacity, car_capacity
            )));
        }
        next.capacity_total = capacity;
        next.available_places = capacity - reserved;
    }
    next.touch();
    debug_assert!(next.is_balanced());

    Ok(Transition {
        write: TripWrite::Update(next.clone()),
        user_updates: Vec::new(),
        event: None,
        outcome: next,
    })
}
