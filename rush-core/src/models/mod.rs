pub mod car;
pub mod trip;
pub mod user;

pub use car::Car;
pub use trip::{Reservation, Trip, TripDetails, TripStatus};
pub use user::{Role, User};
