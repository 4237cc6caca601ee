use rush_core::StoreError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Trip not found: {0}")]
    TripNotFound(Uuid),

    #[error("No reservation for user {user_id} on trip {trip_id}")]
    ReservationNotFound { trip_id: Uuid, user_id: Uuid },

    #[error("Stop '{stop}' not found on trip {trip_id}")]
    StopNotFound { trip_id: Uuid, stop: String },

    #[error("Car not found: {0}")]
    CarNotFound(Uuid),

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("User {user_id} does not own car {car_id}")]
    NotCarOwner { car_id: Uuid, user_id: Uuid },

    #[error("Capacity exceeded: requested {requested}, available {available}")]
    CapacityExceeded { requested: u32, available: u32 },

    #[error("Capacity {requested} is below the {reserved} seats already reserved")]
    CapacityBelowReserved { requested: u32, reserved: u32 },

    #[error("Trip {trip_id} kept changing, gave up after {attempts} attempts")]
    TransientConflict { trip_id: Uuid, attempts: u32 },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Store failure: {0}")]
    Store(StoreError),
}

impl LedgerError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::TransientConflict { .. })
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection: "trips", id } => LedgerError::TripNotFound(id),
            StoreError::NotFound { collection: "users", id } => LedgerError::UserNotFound(id),
            StoreError::NotFound { collection: "cars", id } => LedgerError::CarNotFound(id),
            other => LedgerError::Store(other),
        }
    }
}
