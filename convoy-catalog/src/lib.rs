pub mod listing;
pub mod cache;

pub use listing::{RiderTrips, TripListing};
pub use cache::{listing_key, rider_key, CacheCoordinator, CacheSettings};
