//! Trip and booking mutations: lifecycle rules, the seat ledger and the
//! service that sequences validation, writes, cache invalidation and
//! post-actions.

pub mod error;
pub mod lifecycle;
pub mod ledger;
pub mod service;

pub use error::{BookingError, BookingResult};
pub use lifecycle::{ensure_booking_advance, ensure_trip_transition, LifecycleError};
pub use ledger::{Claim, Release, SeatLedger};
pub use service::{NewTrip, TripChanges, TripService};
