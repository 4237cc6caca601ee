use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kafka topic names, one per ledger event kind.
pub const TOPIC_TRIP_RESERVED: &str = "trips.reserved";
pub const TOPIC_RESERVATION_CANCELLED: &str = "trips.reservation_cancelled";
pub const TOPIC_STOP_CANCELLED: &str = "trips.stop_cancelled";
pub const TOPIC_TRIP_CANCELLED: &str = "trips.cancelled";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TripReservedEvent {
    pub trip_id: Uuid,
    pub reservation_id: Uuid,
    pub user_id: Uuid,
    pub seats_reserved: u32,
    pub available_places: u32,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReservationCancelledEvent {
    pub trip_id: Uuid,
    pub user_id: Uuid,
    pub seats_released: u32,
    pub available_places: u32,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StopCancelledEvent {
    pub trip_id: Uuid,
    pub stop: String,
    /// Users whose reservation was voided because the stop was their last one.
    pub voided_users: Vec<Uuid>,
    pub available_places: u32,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TripCancelledEvent {
    pub trip_id: Uuid,
    pub driver_id: Uuid,
    pub affected_users: Vec<Uuid>,
    pub timestamp: i64,
}

/// Every state change the ledger commits.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEvent {
    TripReserved(TripReservedEvent),
    ReservationCancelled(ReservationCancelledEvent),
    StopCancelled(StopCancelledEvent),
    TripCancelled(TripCancelledEvent),
}

impl LedgerEvent {
    pub fn trip_id(&self) -> Uuid {
        match self {
            LedgerEvent::TripReserved(e) => e.trip_id,
            LedgerEvent::ReservationCancelled(e) => e.trip_id,
            LedgerEvent::StopCancelled(e) => e.trip_id,
            LedgerEvent::TripCancelled(e) => e.trip_id,
        }
    }

    pub fn topic(&self) -> &'static str {
        match self {
            LedgerEvent::TripReserved(_) => TOPIC_TRIP_RESERVED,
            LedgerEvent::ReservationCancelled(_) => TOPIC_RESERVATION_CANCELLED,
            LedgerEvent::StopCancelled(_) => TOPIC_STOP_CANCELLED,
            LedgerEvent::TripCancelled(_) => TOPIC_TRIP_CANCELLED,
        }
    }

    /// Seats left after the event, `None` once the trip is gone.
    pub fn available_places(&self) -> Option<u32> {
        match self {
            LedgerEvent::TripReserved(e) => Some(e.available_places),
            LedgerEvent::ReservationCancelled(e) => Some(e.available_places),
            LedgerEvent::StopCancelled(e) => Some(e.available_places),
            LedgerEvent::TripCancelled(_) => None,
        }
    }
}
