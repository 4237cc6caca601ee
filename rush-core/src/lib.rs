pub mod events;
pub mod models;
pub mod repository;

pub use models::{Car, Reservation, Role, Trip, TripDetails, TripStatus, User};
pub use repository::{
    CarDirectory, CarRepository, StoreError, StoreResult, TripCommit, TripStore, TripWrite,
    UserListUpdate, UserRepository, Versioned,
};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Event publishing failed: {0}")]
    PublishError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
