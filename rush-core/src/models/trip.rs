use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Derived from `available_places`, never stored on its own.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Available,
    Full,
}

/// Descriptive fields a driver fills in when offering a trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripDetails {
    pub start_trip: String,
    pub end_trip: String,
    pub route: String,
    /// `HH:mm`
    pub time_trip: String,
    /// `DD-MM-YYYY`
    pub date: String,
    pub price_trip: u32,
}

/// One user's claim on seats of a trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub seats_reserved: u32,
    pub stops: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(user_id: Uuid, seats_reserved: u32, stops: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            seats_reserved,
            stops,
            created_at: Utc::now(),
        }
    }

    pub fn references_stop(&self, stop: &str) -> bool {
        self.stops.iter().any(|s| s == stop)
    }
}

/// A scheduled journey and its booking state. Persisted as a single document
/// so that every mutation of seats, reservations and stops is one atomic write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trip {
    pub id: Uuid,
    pub car_id: Uuid,
    pub driver_id: Uuid,
    pub details: TripDetails,
    pub capacity_total: u32,
    pub available_places: u32,
    /// Stops declared by the driver at creation. Passenger cancellations never
    /// remove these.
    pub planned_stops: Vec<String>,
    pub stops: Vec<String>,
    /// Booking order.
    pub reservations: Vec<Reservation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    pub fn new(
        car_id: Uuid,
        driver_id: Uuid,
        details: TripDetails,
        capacity_total: u32,
        planned_stops: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        let mut stops: Vec<String> = Vec::with_capacity(planned_stops.len());
        for stop in &planned_stops {
            if !stops.contains(stop) {
                stops.push(stop.clone());
            }
        }
        Self {
            id: Uuid::new_v4(),
            car_id,
            driver_id,
            details,
            capacity_total,
            available_places: capacity_total,
            planned_stops: stops.clone(),
            stops,
            reservations: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> TripStatus {
        if self.available_places > 0 {
            TripStatus::Available
        } else {
            TripStatus::Full
        }
    }

    pub fn seats_reserved(&self) -> u32 {
        self.reservations.iter().map(|r| r.seats_reserved).sum()
    }

    /// `available_places + reserved seats == capacity_total`
    pub fn is_balanced(&self) -> bool {
        self.available_places <= self.capacity_total
            && self.available_places + self.seats_reserved() == self.capacity_total
    }

    pub fn reservation_for(&self, user_id: &Uuid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| &r.user_id == user_id)
    }

    pub fn reservation_for_mut(&mut self, user_id: &Uuid) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| &r.user_id == user_id)
    }

    pub fn has_stop(&self, stop: &str) -> bool {
        self.stops.iter().any(|s| s == stop)
    }

    /// Adds a stop to the trip's set, keeping it free of duplicates.
    pub fn merge_stop(&mut self, stop: &str) {
        if !self.has_stop(stop) {
            self.stops.push(stop.to_string());
        }
    }

    /// True when some reservation other than `except`'s still points at `stop`.
    pub fn stop_claimed_by_others(&self, stop: &str, except: &Uuid) -> bool {
        self.reservations
            .iter()
            .any(|r| &r.user_id != except && r.references_stop(stop))
    }

    pub fn is_planned_stop(&self, stop: &str) -> bool {
        self.planned_stops.iter().any(|s| s == stop)
    }

    pub fn passenger_ids(&self) -> Vec<Uuid> {
        self.reservations.iter().map(|r| r.user_id).collect()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
