pub mod error;
pub mod ledger;
pub mod memory;
pub mod transitions;

pub use error::LedgerError;
pub use ledger::{BookingLedger, LedgerSettings, NewTrip, TripUpdate};
pub use memory::InMemoryStore;
pub use transitions::Transition;
