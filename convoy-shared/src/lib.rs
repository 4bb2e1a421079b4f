pub mod pii;
pub mod models;

pub use models::events::{RideEvent, RideEventKind};
pub use pii::Masked;
